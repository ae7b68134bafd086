//! Collaborator interfaces
//!
//! Everything heddle does to the outside world goes through one of these
//! traits, threaded through the [`Environment`](crate::env::Environment):
//! - [`ProcessRunner`] runs git, gh and shell commands
//! - [`FileSystem`] reads and writes repository files
//! - [`Prompter`] asks the user for confirmation
//! - [`Reporter`] receives structured events
//! - [`MetadataResolver`] answers questions about the hosting service
//! - [`RepositoryInspector`] refreshes git-visible repository facts

pub mod fs;
pub mod inspect;
pub mod metadata;
pub mod process;
pub mod prompt;
pub mod remote;
pub mod reporter;

pub use fs::{FileStat, FileSystem, OsFileSystem};
pub use inspect::{
    FixedInspector, GitInspector, InspectionSnapshot, RepositoryInspector, StatusEntry,
};
pub use metadata::{MetadataResolver, OfflineResolver, RepositoryMetadata, StaticResolver};
pub use process::{
    check_git_available, command_line, run_git, run_git_bool, run_git_checked, CommandOutput, ProcessRunner,
    SystemRunner,
};
pub use prompt::{AutoConfirm, Confirmation, Prompter, ScriptedPrompter, TerminalPrompter};
pub use remote::{RemoteProtocol, RemoteUrl};
pub use reporter::{ConsoleReporter, RecordingReporter, Reporter};
