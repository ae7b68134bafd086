//! `folder rename`: make a repository's directory match its remote name

use anyhow::{Context, Result};
use std::path::PathBuf;

use super::{
    confirm_change, execute_each, operation_error, CleanPolicy, Operation, OperationDefaults,
    RepositoryScopedOperation,
};
use crate::env::Environment;
use crate::outcome::{Event, EventCode};
use crate::repository::RepositoryState;

#[derive(Debug, Clone, Default)]
pub struct FolderRenameOperation {
    /// Place the repository under an owner directory (`<parent>/<owner>/<name>`)
    pub include_owner: bool,
    pub clean: CleanPolicy,
}

impl FolderRenameOperation {
    /// Directory the repository should live in, or `None` when the remote name is unknown
    pub fn target_path(&self, repository: &RepositoryState) -> Option<PathBuf> {
        let name = repository.snapshot.name.as_deref()?;
        let parent = repository.path.parent()?;

        if !self.include_owner {
            return Some(parent.join(name));
        }
        let owner = repository.owner()?;
        let already_under_owner = parent
            .file_name()
            .is_some_and(|dir| dir.to_string_lossy() == owner);
        if already_under_owner {
            Some(parent.join(name))
        } else {
            Some(parent.join(owner).join(name))
        }
    }

    fn rename(&self, env: &Environment, repository: &mut RepositoryState) -> Result<()> {
        if !self.clean.admits(env, repository)? {
            return Ok(());
        }

        let Some(target) = self.target_path(repository) else {
            let reason = "remote name unknown".to_string();
            env.emit(
                Event::warn(EventCode::StepSkipped, reason.clone())
                    .for_repository(repository)
                    .with_detail("reason", reason),
            );
            return Ok(());
        };

        if target == repository.path {
            env.emit(
                Event::info(EventCode::NoChanges, "folder already matches remote name")
                    .for_repository(repository),
            );
            return Ok(());
        }

        if env.fs.exists(&target)? {
            let reason = format!("{} already exists", target.display());
            env.emit(
                Event::warn(EventCode::StepSkipped, reason.clone())
                    .for_repository(repository)
                    .with_detail("reason", reason),
            );
            return Ok(());
        }

        let source = repository.path.clone();
        if env.dry_run {
            env.emit(
                Event::info(
                    EventCode::OperationPlanned,
                    format!("would rename {} -> {}", source.display(), target.display()),
                )
                .for_repository(repository),
            );
            return Ok(());
        }

        let question = format!("Rename {} to {}?", source.display(), target.display());
        if !confirm_change(env, repository, &question)? {
            return Ok(());
        }

        if let Some(parent) = target.parent() {
            env.fs
                .create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        env.fs.rename(&source, &target).with_context(|| {
            format!("Failed to rename {} to {}", source.display(), target.display())
        })?;

        env.shared.rename_repository(&source, &target);
        repository.path = target.clone();
        tracing::info!(from = %source.display(), to = %target.display(), "repository folder renamed");

        env.emit(
            Event::info(
                EventCode::FolderRenamed,
                format!("{} -> {}", source.display(), target.display()),
            )
            .for_repository(repository)
            .with_detail("from", source.display().to_string())
            .with_detail("to", target.display().to_string()),
        );
        Ok(())
    }
}

impl Operation for FolderRenameOperation {
    fn name(&self) -> &str {
        "folder rename"
    }

    fn kind(&self) -> &'static str {
        "folder_rename"
    }

    fn execute(&self, env: &Environment, repositories: &mut [RepositoryState]) -> Result<()> {
        execute_each(self, env, repositories)
    }

    fn as_repository_scoped(&self) -> Option<&dyn RepositoryScopedOperation> {
        Some(self)
    }

    fn apply_defaults(&mut self, defaults: &OperationDefaults) {
        self.clean.apply_default(defaults);
    }
}

impl RepositoryScopedOperation for FolderRenameOperation {
    fn execute_for_repository(
        &self,
        env: &Environment,
        repository: &mut RepositoryState,
    ) -> Result<()> {
        let subject = repository.path.clone();
        self.rename(env, repository)
            .map_err(|e| operation_error(self.kind(), &subject, e))
    }
}
