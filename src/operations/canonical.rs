//! `remote canonicalize`: point a remote at the hosting service's canonical location

use anyhow::{anyhow, Result};

use super::{
    confirm_change, execute_each, operation_error, CleanPolicy, Operation, OperationDefaults,
    RepositoryScopedOperation,
};
use crate::env::Environment;
use crate::outcome::{Event, EventCode};
use crate::ports::{run_git_checked, RemoteProtocol, RemoteUrl};
use crate::repository::RepositoryState;

/// What the metadata resolver says about a remote
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CanonicalRemote {
    Unavailable { reason: String },
    AlreadyCanonical { url: String },
    Change { from: String, to: String },
}

/// Work out the canonical URL for `remote`.
///
/// The current protocol is kept unless `protocol` asks for another one. The
/// host of the current URL is kept when the service returns no URL of its own.
pub fn resolve_canonical_remote(
    env: &Environment,
    repository: &RepositoryState,
    remote: &str,
    protocol: Option<RemoteProtocol>,
) -> Result<CanonicalRemote> {
    if !repository.snapshot.has_remote(remote) {
        return Ok(CanonicalRemote::Unavailable {
            reason: format!("remote {remote} is not configured"),
        });
    }

    let current = run_git_checked(
        env.runner.as_ref(),
        &["remote", "get-url", remote],
        &repository.path,
    )?;
    let parsed =
        RemoteUrl::parse(&current).ok_or_else(|| anyhow!("cannot parse {remote} URL '{current}'"))?;

    let Some(metadata) = env.resolver.resolve(&parsed.owner, &parsed.name)? else {
        return Ok(CanonicalRemote::Unavailable {
            reason: format!("no metadata for {}", parsed.full_name()),
        });
    };

    let canonical = metadata
        .canonical_url
        .as_deref()
        .and_then(RemoteUrl::parse)
        .unwrap_or_else(|| RemoteUrl {
            protocol: parsed.protocol,
            host: parsed.host.clone(),
            owner: metadata.owner.clone(),
            name: metadata.name.clone(),
        });
    let target = canonical.render(protocol.unwrap_or(parsed.protocol));

    if target == current {
        Ok(CanonicalRemote::AlreadyCanonical { url: current })
    } else {
        Ok(CanonicalRemote::Change {
            from: current,
            to: target,
        })
    }
}

/// Set a remote's URL and refresh the repository snapshot.
pub fn apply_remote_url(
    env: &Environment,
    repository: &mut RepositoryState,
    remote: &str,
    url: &str,
) -> Result<()> {
    run_git_checked(
        env.runner.as_ref(),
        &["remote", "set-url", remote, url],
        &repository.path,
    )?;
    repository.refresh(env)
}

#[derive(Debug, Clone)]
pub struct CanonicalizeRemoteOperation {
    pub remote: String,
    pub protocol: Option<RemoteProtocol>,
    pub clean: CleanPolicy,
}

impl CanonicalizeRemoteOperation {
    fn canonicalize(&self, env: &Environment, repository: &mut RepositoryState) -> Result<()> {
        if !self.clean.admits(env, repository)? {
            return Ok(());
        }

        let (from, to) = match resolve_canonical_remote(env, repository, &self.remote, self.protocol)? {
            CanonicalRemote::Unavailable { reason } => {
                env.emit(
                    Event::warn(EventCode::StepSkipped, reason.clone())
                        .for_repository(repository)
                        .with_detail("reason", reason),
                );
                return Ok(());
            }
            CanonicalRemote::AlreadyCanonical { url } => {
                env.emit(
                    Event::info(EventCode::NoChanges, format!("{} already canonical: {url}", self.remote))
                        .for_repository(repository),
                );
                return Ok(());
            }
            CanonicalRemote::Change { from, to } => (from, to),
        };

        if env.dry_run {
            env.emit(
                Event::info(
                    EventCode::OperationPlanned,
                    format!("would update {}: {from} -> {to}", self.remote),
                )
                .for_repository(repository),
            );
            return Ok(());
        }

        let question = format!("Update {} of {} to {to}?", self.remote, repository.identifier());
        if !confirm_change(env, repository, &question)? {
            return Ok(());
        }

        apply_remote_url(env, repository, &self.remote, &to)?;
        env.emit(
            Event::info(EventCode::RemoteUpdated, format!("{}: {from} -> {to}", self.remote))
                .for_repository(repository)
                .with_detail("from", from)
                .with_detail("to", to),
        );
        Ok(())
    }
}

impl Operation for CanonicalizeRemoteOperation {
    fn name(&self) -> &str {
        "remote canonicalize"
    }

    fn kind(&self) -> &'static str {
        "remote_update"
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

impl RepositoryScopedOperation for CanonicalizeRemoteOperation {
    fn execute_for_repository(
        &self,
        env: &Environment,
        repository: &mut RepositoryState,
    ) -> Result<()> {
        self.canonicalize(env, repository)
            .map_err(|e| operation_error(self.kind(), &repository.path, e))
    }
}
