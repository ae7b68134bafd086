//! `remote protocol-convert`: switch a remote between https, ssh and git URLs

use anyhow::{anyhow, Result};

use super::{
    confirm_change, execute_each, operation_error, CleanPolicy, Operation, OperationDefaults,
    RepositoryScopedOperation,
};
use crate::env::Environment;
use crate::outcome::{Event, EventCode};
use crate::ports::{run_git_checked, RemoteProtocol, RemoteUrl};
use crate::repository::RepositoryState;

#[derive(Debug, Clone)]
pub struct ProtocolConvertOperation {
    pub from: RemoteProtocol,
    pub to: RemoteProtocol,
    pub remote: String,
    pub clean: CleanPolicy,
}

impl ProtocolConvertOperation {
    fn convert(&self, env: &Environment, repository: &mut RepositoryState) -> Result<()> {
        if !self.clean.admits(env, repository)? {
            return Ok(());
        }

        if !repository.snapshot.has_remote(&self.remote) {
            let reason = format!("remote {} is not configured", self.remote);
            env.emit(
                Event::warn(EventCode::StepSkipped, reason.clone())
                    .for_repository(repository)
                    .with_detail("reason", reason),
            );
            return Ok(());
        }

        let current = run_git_checked(
            env.runner.as_ref(),
            &["remote", "get-url", &self.remote],
            &repository.path,
        )?;
        let parsed = RemoteUrl::parse(&current)
            .ok_or_else(|| anyhow!("cannot parse {} URL '{current}'", self.remote))?;

        if parsed.protocol != self.from {
            env.emit(
                Event::info(
                    EventCode::NoChanges,
                    format!("{} uses {}, not {}", self.remote, parsed.protocol, self.from),
                )
                .for_repository(repository),
            );
            return Ok(());
        }

        let target = parsed.render(self.to);
        if env.dry_run {
            env.emit(
                Event::info(
                    EventCode::OperationPlanned,
                    format!("would convert {}: {current} -> {target}", self.remote),
                )
                .for_repository(repository),
            );
            return Ok(());
        }

        let question = format!(
            "Convert {} of {} from {} to {}?",
            self.remote,
            repository.identifier(),
            self.from,
            self.to
        );
        if !confirm_change(env, repository, &question)? {
            return Ok(());
        }

        run_git_checked(
            env.runner.as_ref(),
            &["remote", "set-url", &self.remote, &target],
            &repository.path,
        )?;
        repository.refresh(env)?;

        env.emit(
            Event::info(
                EventCode::ProtocolConverted,
                format!("{}: {current} -> {target}", self.remote),
            )
            .for_repository(repository)
            .with_detail("from", self.from.as_str())
            .with_detail("to", self.to.as_str()),
        );
        Ok(())
    }
}

impl Operation for ProtocolConvertOperation {
    fn name(&self) -> &str {
        "remote protocol-convert"
    }

    fn kind(&self) -> &'static str {
        "protocol_convert"
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

impl RepositoryScopedOperation for ProtocolConvertOperation {
    fn execute_for_repository(
        &self,
        env: &Environment,
        repository: &mut RepositoryState,
    ) -> Result<()> {
        self.convert(env, repository)
            .map_err(|e| operation_error(self.kind(), &repository.path, e))
    }
}
