use std::path::PathBuf;
use std::process::{Child, Stdio};
use std::time::Duration;

use anyhow::Result;
use tokio::time::Instant;

use crate::cli::{DaemonCli, DaemonCommand, StartArgs};
use crate::config::Config;
use crate::daemon::{Daemon, LifecycleError, StatusFile, StatusRecord};

/// Settings shared by every daemon subcommand
struct DaemonContext {
    config: Config,
    config_path: Option<PathBuf>,
    quiet: bool,
}

impl DaemonContext {
    fn status_file(&self) -> StatusFile {
        StatusFile::new(&self.config.daemon.status_dir)
            .with_poll_interval(self.config.daemon.poll_interval())
    }

    fn say(&self, message: impl std::fmt::Display) {
        if !self.quiet {
            println!("{}", message);
        }
    }
}

/// Handle daemon management commands
pub async fn handle_daemon(cli: DaemonCli) -> Result<()> {
    let mut config = Config::load_or_default(cli.config.as_deref())?;
    cli.apply(&mut config);

    let mut ctx = DaemonContext {
        config,
        config_path: cli.config.clone(),
        quiet: cli.quiet,
    };

    match cli.command {
        DaemonCommand::Start(args) => start(&mut ctx, &args).await,
        DaemonCommand::Stop => {
            stop(&ctx).await?;
            ctx.say("Daemon stopped.");
            Ok(())
        }
        DaemonCommand::Restart(args) => {
            match stop(&ctx).await {
                Ok(()) => ctx.say("Daemon stopped."),
                Err(LifecycleError::NotRunning | LifecycleError::ProcessNotFound(_)) => {}
                Err(e) => return Err(e.into()),
            }
            start(&mut ctx, &args).await
        }
        DaemonCommand::Status { wait } => status(&ctx, wait).await,
    }
}

async fn start(ctx: &mut DaemonContext, args: &StartArgs) -> Result<()> {
    args.apply(&mut ctx.config);
    ctx.config.validate()?;

    let status = ctx.status_file();
    if status.exists() {
        if !args.force {
            return Err(LifecycleError::AlreadyRunning.into());
        }
        status.remove()?;
    }

    if args.foreground {
        let daemon = Daemon::start(ctx.config.clone()).await?;
        return daemon.run().await;
    }

    let mut child = spawn_detached(ctx, args)?;
    if args.wait {
        let timeout = ctx.config.daemon.start_timeout();
        let record = wait_until_started(&status, &mut child, timeout).await?;
        ctx.say(format!("Daemon started: {}", record));
    }
    Ok(())
}

/// Re-run this executable as a detached foreground daemon
fn spawn_detached(ctx: &DaemonContext, args: &StartArgs) -> Result<Child, LifecycleError> {
    let exe = std::env::current_exe()
        .map_err(|e| LifecycleError::StartFailed(format!("failed to resolve executable: {}", e)))?;

    let mut cmd = std::process::Command::new(&exe);
    cmd.args(args.foreground_args(&ctx.config, ctx.config_path.as_ref()));
    cmd.stdin(Stdio::null()).stdout(Stdio::null());
    if ctx.quiet {
        cmd.stderr(Stdio::null());
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    cmd.spawn()
        .map_err(|e| LifecycleError::StartFailed(format!("failed to spawn daemon: {}", e)))
}

/// Wait for the spawned daemon to publish its record
async fn wait_until_started(
    status: &StatusFile,
    child: &mut Child,
    timeout: Duration,
) -> Result<StatusRecord, LifecycleError> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(record) = status.read()? {
            return Ok(record);
        }
        if let Ok(Some(exit)) = child.try_wait() {
            return Err(LifecycleError::StartFailed(format!("daemon exited early ({})", exit)));
        }
        if Instant::now() >= deadline {
            return Err(LifecycleError::StartFailed(format!(
                "no status file after {:?}",
                timeout
            )));
        }
        tokio::time::sleep(status.poll_interval()).await;
    }
}

async fn stop(ctx: &DaemonContext) -> Result<(), LifecycleError> {
    let status = ctx.status_file();
    let record = status.read()?.ok_or(LifecycleError::NotRunning)?;

    request_stop(ctx, &status, &record).await?;

    if !status.wait(false, Some(ctx.config.daemon.stop_timeout())).await {
        return Err(LifecycleError::StopTimeout);
    }
    Ok(())
}

#[cfg(unix)]
async fn request_stop(
    _ctx: &DaemonContext,
    status: &StatusFile,
    record: &StatusRecord,
) -> Result<(), LifecycleError> {
    let pid = record.pid;
    let target = libc::pid_t::try_from(pid)
        .ok()
        .filter(|&p| p > 0)
        .ok_or_else(|| LifecycleError::Corrupt {
            path: status.path().to_path_buf(),
            reason: format!("invalid pid {}", pid),
        })?;
    let rc = unsafe { libc::kill(target, libc::SIGTERM) };
    if rc == 0 {
        return Ok(());
    }

    let err = std::io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        status.remove()?;
        return Err(LifecycleError::ProcessNotFound(pid));
    }
    Err(LifecycleError::Signal { pid, source: err })
}

#[cfg(not(unix))]
async fn request_stop(
    ctx: &DaemonContext,
    _status: &StatusFile,
    record: &StatusRecord,
) -> Result<(), LifecycleError> {
    use crate::client::{ClientError, DaemonClient};

    let client = DaemonClient::discover(&ctx.config.daemon.status_dir, &ctx.config.client)
        .await
        .map_err(|e| match e {
            ClientError::Status(e) => e,
            _ => LifecycleError::NotRunning,
        })?;
    client.kill().await.map_err(|e| LifecycleError::Signal {
        pid: record.pid,
        source: std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
    })
}

async fn status(ctx: &DaemonContext, wait: bool) -> Result<()> {
    let status = ctx.status_file();
    if wait {
        loop {
            status.wait(true, None).await;
            if status.read()?.is_some() {
                break;
            }
            tokio::time::sleep(status.poll_interval()).await;
        }
    }

    match status.read()? {
        Some(record) => {
            println!("{}", record);
            Ok(())
        }
        None => Err(LifecycleError::NotRunning.into()),
    }
}
