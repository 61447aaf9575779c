use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::thread;

use crate::error::{CoreError, CoreErrorCode};

const PAYLOAD_FILE_NAME: &str = "payload.gvas";
const TREE_FILE_NAME: &str = "tree.json";

/// Every file `UesaveCodec` creates in its scratch dir.
pub const SCRATCH_FILE_NAMES: [&str; 2] = [PAYLOAD_FILE_NAME, TREE_FILE_NAME];

/// Converts between a raw save payload and the text form of its property tree.
pub trait TreeCodec {
    fn to_tree(&self, raw: &[u8], type_hints: &[String]) -> Result<String, CoreError>;
    fn from_tree(&self, tree_text: &str) -> Result<Vec<u8>, CoreError>;
}

impl<T: TreeCodec + ?Sized> TreeCodec for &T {
    fn to_tree(&self, raw: &[u8], type_hints: &[String]) -> Result<String, CoreError> {
        (**self).to_tree(raw, type_hints)
    }

    fn from_tree(&self, tree_text: &str) -> Result<Vec<u8>, CoreError> {
        (**self).from_tree(tree_text)
    }
}

/// Runs the `uesave` executable, exchanging data through files in `scratch_dir`.
#[derive(Debug, Clone)]
pub struct UesaveCodec {
    executable: PathBuf,
    scratch_dir: PathBuf,
}

impl UesaveCodec {
    pub fn new(executable: impl Into<PathBuf>, scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            scratch_dir: scratch_dir.into(),
        }
    }

    pub fn payload_path(&self) -> PathBuf {
        self.scratch_dir.join(PAYLOAD_FILE_NAME)
    }

    pub fn tree_path(&self) -> PathBuf {
        self.scratch_dir.join(TREE_FILE_NAME)
    }

    pub fn to_json_args(&self, type_hints: &[String]) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "to-json".into(),
            "--output".into(),
            self.tree_path().into_os_string(),
        ];
        for hint in type_hints {
            args.push("--type".into());
            args.push(hint.into());
        }
        args
    }

    pub fn from_json_args(&self) -> Vec<OsString> {
        vec![
            "from-json".into(),
            "--input".into(),
            self.tree_path().into_os_string(),
            "--output".into(),
            self.payload_path().into_os_string(),
        ]
    }

    fn ensure_scratch_dir(&self) -> Result<(), CoreError> {
        fs::create_dir_all(&self.scratch_dir).map_err(|e| {
            CoreError::io(
                format_args!("failed to create {}", self.scratch_dir.display()),
                e,
            )
        })
    }

    fn run(&self, args: Vec<OsString>, stdin: Option<&[u8]>) -> Result<(), CoreError> {
        log::debug!("running {} {:?}", self.executable.display(), args);
        let mut child = Command::new(&self.executable)
            .args(&args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                CoreError::new(
                    CoreErrorCode::ExternalCodecFailure,
                    format!("failed to start {}: {e}", self.executable.display()),
                )
            })?;

        let output = match (stdin, child.stdin.take()) {
            (Some(input), Some(mut pipe)) => thread::scope(|scope| {
                let writer = scope.spawn(move || pipe.write_all(input));
                let output = child.wait_with_output();
                // A codec that exits early closes the pipe; its status explains why.
                let _ = writer.join();
                output
            }),
            _ => child.wait_with_output(),
        }
        .map_err(|e| {
            CoreError::new(
                CoreErrorCode::ExternalCodecFailure,
                format!("failed waiting for {}: {e}", self.executable.display()),
            )
        })?;

        if !output.status.success() {
            return Err(codec_failure(&self.executable, &args, &output));
        }
        Ok(())
    }
}

impl TreeCodec for UesaveCodec {
    fn to_tree(&self, raw: &[u8], type_hints: &[String]) -> Result<String, CoreError> {
        self.ensure_scratch_dir()?;
        let payload_path = self.payload_path();
        fs::write(&payload_path, raw).map_err(|e| {
            CoreError::io(format_args!("failed to write {}", payload_path.display()), e)
        })?;

        self.run(self.to_json_args(type_hints), Some(raw))?;

        let tree_path = self.tree_path();
        fs::read_to_string(&tree_path)
            .map_err(|e| CoreError::io(format_args!("failed to read {}", tree_path.display()), e))
    }

    fn from_tree(&self, tree_text: &str) -> Result<Vec<u8>, CoreError> {
        self.ensure_scratch_dir()?;
        let tree_path = self.tree_path();
        fs::write(&tree_path, tree_text).map_err(|e| {
            CoreError::io(format_args!("failed to write {}", tree_path.display()), e)
        })?;

        self.run(self.from_json_args(), None)?;

        let payload_path = self.payload_path();
        fs::read(&payload_path).map_err(|e| {
            CoreError::io(format_args!("failed to read {}", payload_path.display()), e)
        })
    }
}

fn codec_failure(executable: &Path, args: &[OsString], output: &Output) -> CoreError {
    let command = args
        .first()
        .map(|a| a.to_string_lossy().into_owned())
        .unwrap_or_default();
    CoreError::new(
        CoreErrorCode::ExternalCodecFailure,
        format!(
            "{} {command} failed ({})\n{}{}",
            executable.display(),
            output.status,
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        ),
    )
}
