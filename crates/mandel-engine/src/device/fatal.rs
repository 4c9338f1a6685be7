use std::fmt;

/// Unrecoverable setup failures. Each maps to a distinct process exit code.
#[derive(Debug, Clone)]
pub enum FatalError {
    /// A shader source file could not be read.
    ShaderRead { path: String, reason: String },
    /// At least one shader stage failed to compile. Both stage logs are kept.
    ShaderCompile { vertex_log: String, fragment_log: String },
    /// Stages compiled but could not be linked into one program.
    ProgramLink { log: String },
    /// A render target was left without a complete attachment set.
    IncompleteFramebuffer { reason: String },
}

impl FatalError {
    pub fn exit_code(&self) -> i32 {
        match self {
            FatalError::ShaderRead { .. } => 2,
            FatalError::ShaderCompile { .. } => 3,
            FatalError::ProgramLink { .. } => 4,
            FatalError::IncompleteFramebuffer { .. } => 5,
        }
    }
}

impl fmt::Display for FatalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FatalError::ShaderRead { path, reason } => {
                write!(f, "could not read shader {path}: {reason}")
            }
            FatalError::ShaderCompile { vertex_log, fragment_log } => {
                write!(f, "shader compilation failed")?;
                if !vertex_log.is_empty() {
                    write!(f, "\nvertex shader log:\n{vertex_log}")?;
                }
                if !fragment_log.is_empty() {
                    write!(f, "\nfragment shader log:\n{fragment_log}")?;
                }
                Ok(())
            }
            FatalError::ProgramLink { log } => write!(f, "program link failed:\n{log}"),
            FatalError::IncompleteFramebuffer { reason } => {
                write!(f, "framebuffer incomplete: {reason}")
            }
        }
    }
}

impl std::error::Error for FatalError {}

/// Logs `err`, flushes the logger and exits with the error's code.
pub fn terminate(err: FatalError) -> ! {
    log::error!("{err}");
    log::logger().flush();
    std::process::exit(err.exit_code())
}

/// Set in a child test process to the name of the test it should run.
#[cfg(test)]
const CHILD_ENV: &str = "MANDEL_FATAL_CHILD";

/// True inside the child spawned by [`child_exit_code`] for `test`.
#[cfg(test)]
pub(crate) fn is_fatal_child(test: &str) -> bool {
    std::env::var(CHILD_ENV).is_ok_and(|v| v == test)
}

/// Re-runs the single test `test` (full path) of the current test binary in
/// a child process and returns its exit code.
#[cfg(test)]
pub(crate) fn child_exit_code(test: &str) -> Option<i32> {
    let exe = std::env::current_exe().ok()?;
    let status = std::process::Command::new(exe)
        .args([test, "--exact", "--test-threads=1", "--nocapture"])
        .env(CHILD_ENV, test)
        .status()
        .ok()?;
    status.code()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct() {
        let codes = [
            FatalError::ShaderRead { path: "a".into(), reason: "b".into() }.exit_code(),
            FatalError::ShaderCompile { vertex_log: String::new(), fragment_log: String::new() }
                .exit_code(),
            FatalError::ProgramLink { log: String::new() }.exit_code(),
            FatalError::IncompleteFramebuffer { reason: String::new() }.exit_code(),
        ];
        assert_eq!(codes, [2, 3, 4, 5]);
    }

    #[test]
    fn compile_message_carries_both_logs() {
        let err = FatalError::ShaderCompile {
            vertex_log: "bad vertex".into(),
            fragment_log: "bad fragment".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("bad vertex"));
        assert!(msg.contains("bad fragment"));
    }
}
