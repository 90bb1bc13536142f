//! Speech adapters backed by external programs
//!
//! The recognizer runs a program that records one utterance and prints the
//! transcript on stdout. The synthesizer runs a program with the text as its
//! last argument. Both receive the language in `TALKBACK_LANG`.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Mutex;
use tokio::process::{Child, Command};

use super::{SpeechError, SpeechRecognizer, SpeechSynthesizer};

const LANG_ENV: &str = "TALKBACK_LANG";

/// Resolve `program` to an executable path, searching `PATH` for bare names
pub fn find_program(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }

    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|path| path.is_file())
}

pub struct CommandRecognizer {
    program: String,
    args: Vec<String>,
    lang: String,
}

impl CommandRecognizer {
    pub fn new(program: &str, args: Vec<String>, lang: &str) -> Self {
        Self {
            program: program.to_string(),
            args,
            lang: lang.to_string(),
        }
    }
}

#[async_trait]
impl SpeechRecognizer for CommandRecognizer {
    async fn transcribe_once(&self) -> Result<String, SpeechError> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .env(LANG_ENV, &self.lang)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(SpeechError::RecognizerFailed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let transcript = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if transcript.is_empty() {
            return Err(SpeechError::NoSpeech);
        }
        Ok(transcript)
    }
}

pub struct CommandSynthesizer {
    program: String,
    args: Vec<String>,
    lang: String,
    current: Mutex<Option<Child>>,
}

impl CommandSynthesizer {
    pub fn new(program: &str, args: Vec<String>, lang: &str) -> Self {
        Self {
            program: program.to_string(),
            args,
            lang: lang.to_string(),
            current: Mutex::new(None),
        }
    }
}

fn still_running(child: &mut Child) -> bool {
    matches!(child.try_wait(), Ok(None))
}

impl SpeechSynthesizer for CommandSynthesizer {
    fn speak(&self, text: &str) -> Result<(), SpeechError> {
        let mut current = self
            .current
            .lock()
            .map_err(|e| std::io::Error::other(e.to_string()))?;

        if let Some(child) = current.as_mut() {
            if still_running(child) {
                tracing::debug!("Cancelling previous utterance");
                child.start_kill().ok();
            }
        }

        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(text)
            .env(LANG_ENV, &self.lang)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;
        *current = Some(child);
        Ok(())
    }

    fn is_speaking(&self) -> bool {
        match self.current.lock() {
            Ok(mut current) => current.as_mut().is_some_and(still_running),
            Err(_) => false,
        }
    }

    fn cancel(&self) {
        if let Ok(mut current) = self.current.lock() {
            if let Some(mut child) = current.take() {
                child.start_kill().ok();
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_find_program() {
        assert!(find_program("sh").is_some());
        assert!(find_program("/bin/sh").is_some());
        assert!(find_program("talkback-definitely-missing").is_none());
    }

    #[tokio::test]
    async fn test_recognizer_reads_stdout() {
        let recognizer = CommandRecognizer::new(
            "sh",
            vec!["-c".into(), "echo \"  $TALKBACK_LANG hello  \"".into()],
            "en-US",
        );
        assert_eq!(recognizer.transcribe_once().await.unwrap(), "en-US hello");
    }

    #[tokio::test]
    async fn test_recognizer_failure() {
        let recognizer =
            CommandRecognizer::new("sh", vec!["-c".into(), "echo nope >&2; exit 3".into()], "en-US");
        match recognizer.transcribe_once().await {
            Err(SpeechError::RecognizerFailed { stderr, .. }) => assert_eq!(stderr, "nope"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_recognizer_silence() {
        let recognizer = CommandRecognizer::new("true", Vec::new(), "en-US");
        assert!(matches!(
            recognizer.transcribe_once().await,
            Err(SpeechError::NoSpeech)
        ));
    }

    /// Whether `pid` names a live process; zombies count as gone
    #[cfg(target_os = "linux")]
    fn process_alive(pid: u32) -> bool {
        match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
            Ok(stat) => match stat.rsplit_once(") ") {
                Some((_, rest)) => !rest.starts_with('Z') && !rest.starts_with('X'),
                None => false,
            },
            Err(_) => false,
        }
    }

    #[cfg(target_os = "linux")]
    async fn wait_for_pid(path: &Path) -> u32 {
        for _ in 0..200 {
            if let Ok(contents) = std::fs::read_to_string(path) {
                if let Ok(pid) = contents.trim().parse() {
                    return pid;
                }
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("no pid written to {}", path.display());
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_new_utterance_kills_previous_process() {
        // The spoken text lands in $0: each utterance writes its pid there
        let synthesizer = CommandSynthesizer::new(
            "sh",
            vec!["-c".into(), "echo $$ > \"$0\"; exec sleep 5".into()],
            "en-US",
        );
        let dir = std::env::temp_dir();
        let first_path = dir.join(format!("talkback-tts-{}", uuid::Uuid::new_v4()));
        let second_path = dir.join(format!("talkback-tts-{}", uuid::Uuid::new_v4()));

        synthesizer.speak(&first_path.to_string_lossy()).unwrap();
        let first = wait_for_pid(&first_path).await;
        assert!(process_alive(first));

        synthesizer.speak(&second_path.to_string_lossy()).unwrap();
        let second = wait_for_pid(&second_path).await;
        assert_ne!(first, second);

        let mut killed = false;
        for _ in 0..200 {
            if !process_alive(first) {
                killed = true;
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(killed, "first utterance still running");
        assert!(process_alive(second));
        assert!(synthesizer.is_speaking());

        synthesizer.cancel();
        assert!(!synthesizer.is_speaking());

        std::fs::remove_file(&first_path).ok();
        std::fs::remove_file(&second_path).ok();
    }
}
