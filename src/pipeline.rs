//! The worker: startup (adapters → scan → selection → sessions → sinks)
//! followed by the dispatch loop.

use std::sync::Arc;

use log::{error, info, warn};

use crate::adapter::{AdapterManager, Central, Radio};
use crate::config::Config;
use crate::dispatcher::Dispatcher;
use crate::error::Result;
use crate::scanner::{list_devices, DeviceScanner};
use crate::selector::select;
use crate::session::SensorSession;
use crate::shutdown::Shutdown;
use crate::sink::SinkSet;

/// Everything the worker owns.  Handed back to the supervisor for teardown
/// when the worker exits.
pub struct Pipeline {
    /// First adapter, if any; used for scanning and for the final scan stop.
    pub adapter: Option<Arc<dyn Central>>,
    /// One slot per selected device, indexed by dispatch index.  A slot is
    /// empty when its device could not be connected.
    pub sessions: Vec<Option<SensorSession>>,
    pub sinks: SinkSet,
}

impl Pipeline {
    pub fn empty(sinks: SinkSet) -> Self {
        Self {
            adapter: None,
            sessions: Vec::new(),
            sinks,
        }
    }

    pub fn live_sessions(&self) -> usize {
        self.sessions.iter().flatten().count()
    }
}

pub struct Worker {
    config: Config,
    radio: Arc<dyn Radio>,
    sinks: SinkSet,
    shutdown: Shutdown,
}

impl Worker {
    pub fn new(config: Config, radio: Arc<dyn Radio>, sinks: SinkSet, shutdown: Shutdown) -> Self {
        Self {
            config,
            radio,
            sinks,
            shutdown,
        }
    }

    /// Build the pipeline, then dispatch until shutdown.
    ///
    /// Adapter enumeration and scan start failures abort startup.  A
    /// shutdown request during startup skips the remaining steps and returns
    /// what has been built so far.
    pub async fn run(self) -> Result<Pipeline> {
        let Worker {
            config,
            radio,
            sinks,
            shutdown,
        } = self;
        let mut pipeline = Pipeline::empty(sinks);

        let adapters = AdapterManager::new(radio).list_adapters().await?;
        pipeline.adapter = adapters.into_iter().next();

        let discovered = match &pipeline.adapter {
            Some(adapter) => {
                let found = DeviceScanner::new(config.scan_window())
                    .scan(adapter.as_ref(), &shutdown)
                    .await?;
                list_devices(&found);
                found
            }
            None => Vec::new(),
        };

        if shutdown.is_triggered() {
            return Ok(pipeline);
        }

        let selected = select(&discovered, &config.selection());
        if let Some(adapter) = &pipeline.adapter {
            for (index, record) in selected.into_iter().enumerate() {
                if shutdown.is_triggered() {
                    return Ok(pipeline);
                }
                let mut session = SensorSession::new(index, record);
                if let Err(e) = session
                    .connect(
                        adapter.as_ref(),
                        config.settle(),
                        config.connect_timeout(),
                        &shutdown,
                    )
                    .await
                {
                    error!("Session {index} ({}): connect failed: {e}", session.record().address);
                    pipeline.sessions.push(None);
                    continue;
                }
                if !shutdown.is_triggered() {
                    if let Err(e) = session.setup(&shutdown).await {
                        warn!(
                            "Session {index} ({}): setup failed, streaming zeros: {e}",
                            session.record().address
                        );
                    }
                }
                pipeline.sessions.push(Some(session));
            }
        }

        if pipeline.live_sessions() == 0 {
            warn!("No {} sensors found!", config.name_filter);
        }

        for server in &config.servers {
            if shutdown.is_triggered() {
                return Ok(pipeline);
            }
            if let Err(e) = pipeline.sinks.add(&server.host, server.port).await {
                error!("Sink {}:{} unavailable: {e}", server.host, server.port);
            }
        }

        info!(
            "Startup complete: {} session(s), {} sink(s).",
            pipeline.live_sessions(),
            pipeline.sinks.len()
        );

        let mut dispatcher = Dispatcher::new(config.interval(), shutdown);
        dispatcher
            .run(&mut pipeline.sessions, &mut pipeline.sinks)
            .await;
        Ok(pipeline)
    }
}
