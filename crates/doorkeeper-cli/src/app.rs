//! Wiring of one door: every component is built here once and handed to
//! the tasks that use it.
//!
//! ```text
//!  poll threads            tokio tasks                      main task
//! ┌──────────────┐   ┌──────────────────────────┐   ┌──────────────────────┐
//! │ reader       │   │ card cache refresh       │   │ DoorController::run  │
//! │ lock         │   │ gateway sync ────────────┼──>│ select! exits on     │
//! │ panel        │   │ 4 dispatch consumers     │   │ gateway failure or   │
//! └──────────────┘   └──────────────────────────┘   │ Ctrl-C               │
//!                                                   └──────────────────────┘
//! ```

use crate::config::{DoorkeeperConfig, ResolvedCredentials};
use anyhow::{Context, Result, bail};
use doorkeeper_cache::{CardCache, HttpPermissionSource, PermissionSource};
use doorkeeper_controller::{
    Devices, DoorController, GatewayClient, GatewayError, GatewayLink, Outbound, run_sync,
};
use doorkeeper_core::CardId;
use doorkeeper_dispatch::{
    AuditSink, ChatSink, DebugLogSink, EventLog, MembershipSink, MembershipUpdater, Notifier,
    RetryPolicy, channel, run_consumer,
};
use doorkeeper_hardware::{
    ButtonPanel, CardReaderSession, CardSource, DoorLock, LockSession, LogDisplay,
    SerialButtonPanel, Shutdown, StatusDisplay,
    mock::{MockCardSource, MockDoorLock, MockPanel},
    open_serial,
};
use std::{sync::Arc, thread::JoinHandle};
use tokio::task::JoinHandle as TaskHandle;
use tracing::{info, warn};

/// Run the door until the gateway gives up or the process is interrupted.
pub async fn run(config: DoorkeeperConfig, dry_run: bool) -> Result<()> {
    let credentials = config.credentials.resolve()?;
    let outbound = spawn_dispatchers(&config, &credentials)?;

    let source = HttpPermissionSource::new(config.permission_source_config(&credentials))
        .context("failed to build permission service client")?;
    let cache = Arc::new(CardCache::new(source, config.cache_config()));
    tokio::spawn(Arc::clone(&cache).run_refresh());

    let link = GatewayLink::new();
    let client = GatewayClient::new(config.gateway_config(&credentials))
        .context("failed to build gateway client")?;
    let gateway = tokio::spawn(run_sync(link.clone(), client));

    let shutdown = Shutdown::new();
    let result = if dry_run {
        warn!("dry run, serial devices replaced by in-memory devices");
        let (reader, _reader_handle) = MockCardSource::new();
        let (lock, _lock_handle) = MockDoorLock::new();
        let devices = Devices {
            reader,
            lock,
            panel: MockPanel::new(),
            display: LogDisplay::new(),
        };
        drive(devices, cache, outbound, link, &config, gateway).await
    } else {
        let (devices, threads) = open_devices(&config, &shutdown)?;
        let result = drive(devices, cache, outbound, link, &config, gateway).await;
        shutdown.trigger();
        join_threads(threads).await;
        result
    };
    info!("doorkeeper stopped");
    result
}

fn spawn_dispatchers(
    config: &DoorkeeperConfig,
    credentials: &ResolvedCredentials,
) -> Result<Outbound> {
    let dispatch = &config.dispatch;
    let timeout = config.request_timeout();

    let (debug_tx, debug_rx) = channel("debug-log", dispatch.log_capacity);
    let (audit_tx, audit_rx) = channel("audit-log", dispatch.log_capacity);
    let (chat_tx, chat_rx) = channel("chat", dispatch.chat_capacity);
    let (member_tx, member_rx) = channel("membership", dispatch.membership_capacity);

    let debug_sink = DebugLogSink::new(
        &config.gateway.url,
        Some(credentials.gateway_token.clone()),
        timeout,
    )?;
    let audit_sink = AuditSink::new(
        &config.cache.base_url,
        Some(credentials.api_token.clone()),
        timeout,
    )?;
    let chat_sink = ChatSink::new(config.chat_config(credentials))?;
    let membership_sink = MembershipSink::new(
        &config.membership.base_url,
        credentials.membership_user.clone(),
        credentials.membership_password.clone(),
        timeout,
    )?;

    tokio::spawn(run_consumer(debug_rx, debug_sink, RetryPolicy::debug_log()));
    tokio::spawn(run_consumer(audit_rx, audit_sink, RetryPolicy::audit()));
    tokio::spawn(run_consumer(chat_rx, chat_sink, RetryPolicy::chat()));
    tokio::spawn(run_consumer(member_rx, membership_sink, RetryPolicy::membership()));

    let mut notifier = Notifier::new(chat_tx);
    if config.chat.door_prefix {
        notifier = notifier.door_name(&config.controller.door_name);
    }
    Ok(Outbound {
        events: EventLog::new(debug_tx, audit_tx),
        notifier,
        membership: MembershipUpdater::new(member_tx),
    })
}

type SerialDevices = Devices<CardReaderSession, LockSession, SerialButtonPanel, LogDisplay>;

fn open_devices(
    config: &DoorkeeperConfig,
    shutdown: &Shutdown,
) -> Result<(SerialDevices, Vec<JoinHandle<()>>)> {
    let reader_port = open_serial(&config.reader.device, config.reader.baud_rate)
        .with_context(|| format!("failed to open card reader on {}", config.reader.device))?;
    let lock_port = open_serial(&config.lock.device, config.lock.baud_rate)
        .with_context(|| format!("failed to open lock on {}", config.lock.device))?;
    let panel_port = open_serial(&config.panel.device, config.panel.baud_rate)
        .with_context(|| format!("failed to open button panel on {}", config.panel.device))?;

    let (reader, reader_thread) =
        CardReaderSession::spawn(reader_port, config.reader_config(), shutdown.clone())?;
    let (lock, lock_thread) = LockSession::spawn(lock_port, config.lock_config(), shutdown.clone())?;
    let (panel, panel_thread) =
        SerialButtonPanel::spawn(panel_port, config.panel_config(), shutdown.clone())?;

    let devices = Devices {
        reader,
        lock,
        panel,
        display: LogDisplay::new(),
    };
    Ok((devices, vec![reader_thread, lock_thread, panel_thread]))
}

async fn drive<R, L, P, D>(
    devices: Devices<R, L, P, D>,
    access: Arc<CardCache<HttpPermissionSource>>,
    outbound: Outbound,
    link: GatewayLink,
    config: &DoorkeeperConfig,
    mut gateway: TaskHandle<Result<(), GatewayError>>,
) -> Result<()>
where
    R: CardSource,
    L: DoorLock,
    P: ButtonPanel,
    D: StatusDisplay,
{
    let mut controller =
        DoorController::new(devices, access, outbound, link, config.controller_config())?;

    tokio::select! {
        () = controller.run() => Ok(()),
        joined = &mut gateway => match joined {
            Ok(Err(e)) => Err(e).context("gateway link lost"),
            Ok(Ok(())) => bail!("gateway sync stopped"),
            Err(e) => Err(e).context("gateway task failed"),
        },
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for Ctrl-C")?;
            info!("interrupted, shutting down");
            gateway.abort();
            Ok(())
        }
    }
}

async fn join_threads(threads: Vec<JoinHandle<()>>) {
    let joined = tokio::task::spawn_blocking(move || {
        for thread in threads {
            if thread.join().is_err() {
                warn!("device poll thread panicked");
            }
        }
    })
    .await;
    if let Err(e) = joined {
        warn!(error = %e, "failed to join device poll threads");
    }
}

/// Ask the permission service about one card and print the answer.
pub async fn lookup(config: DoorkeeperConfig, card: &str) -> Result<()> {
    let card_id = CardId::from_hex(card).with_context(|| format!("invalid card id '{card}'"))?;
    let credentials = config.credentials.resolve()?;
    let source = HttpPermissionSource::new(config.permission_source_config(&credentials))?;
    if !source.is_configured() {
        bail!("no API token configured");
    }
    let cache = CardCache::new(source, config.cache_config());
    let result = cache.has_access(card_id).await;
    println!("{card_id}: {result}");
    Ok(())
}
