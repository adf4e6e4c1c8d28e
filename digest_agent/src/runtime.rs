//! Process lifecycle: startup wiring, the inbound event loop and the ordered
//! shutdown sequence.
use crate::args::Args;
use crate::delivery::DeliveryChannel;
use crate::dispatcher::Dispatcher;
use crate::fetcher::{DataFetcher, provider_for};
use crate::keepalive::KeepAliveListener;
use crate::model::instance_guard::InstanceGuard;
use crate::model::job_registry::{JobKey, JobRegistry, JobSchedule};
use crate::model::scheduler::ThreadScheduler;
use crate::pipeline::DigestPipeline;
use crate::poller::{InboundEvent, UpdatePoller};
use crate::supervisor::{ConnectionSupervisor, RecoveryDelays, StreamFault};
use crate::telegram::TelegramApi;
use crossbeam_channel::{Receiver, select, unbounded};
use digest_common::format::DigestFormatter;
use digest_common::net::{DISPLAY_COUNT, JOB_PERIOD, LONG_POLL_SECS, POLL_INTERVAL, addr};
use digest_common::{CommandEvent, Destination, Result};
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

type Step<'a> = Box<dyn FnOnce() -> Result<()> + 'a>;

/// Result of one shutdown step.
#[derive(Debug)]
pub struct StepOutcome {
    /// Step name, for logging.
    pub name: &'static str,
    /// What the step returned.
    pub result: Result<()>,
}

/// Named steps run in order. A failing step is recorded and the sequence moves on.
#[derive(Default)]
pub struct ShutdownSequence<'a> {
    steps: Vec<(&'static str, Step<'a>)>,
}

impl<'a> ShutdownSequence<'a> {
    /// Empty sequence.
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Append a step.
    pub fn step(mut self, name: &'static str, step: impl FnOnce() -> Result<()> + 'a) -> Self {
        self.steps.push((name, Box::new(step)));
        self
    }

    /// Run every step, in insertion order.
    pub fn run(self) -> Vec<StepOutcome> {
        self.steps
            .into_iter()
            .map(|(name, step)| {
                let result = step();
                match &result {
                    Ok(()) => debug!("Shutdown step '{}' done", name),
                    Err(e) => error!("Shutdown step '{}' failed: {}", name, e),
                }
                StepOutcome { name, result }
            })
            .collect()
    }
}

/// The running agent: every component that outlives a single command.
pub struct Agent {
    registry: Arc<JobRegistry>,
    pipeline: Arc<DigestPipeline>,
    dispatcher: Arc<Dispatcher>,
    supervisor: Arc<ConnectionSupervisor>,
    broadcast: Destination,
}

impl Agent {
    /// Assemble an agent from already built components.
    pub fn new(
        registry: Arc<JobRegistry>,
        pipeline: Arc<DigestPipeline>,
        dispatcher: Arc<Dispatcher>,
        supervisor: Arc<ConnectionSupervisor>,
        broadcast: Destination,
    ) -> Self {
        Self {
            registry,
            pipeline,
            dispatcher,
            supervisor,
            broadcast,
        }
    }

    /// Post to the broadcast destination now and then every job period.
    pub fn start_broadcast(&self) -> Result<()> {
        let task = self.pipeline.task(self.broadcast.clone(), None);
        let schedule = JobSchedule::every(JOB_PERIOD).with_first_run(Duration::ZERO);
        self.registry.start_job(JobKey::Broadcast, task, schedule)?;
        info!("Auto-posting to {} every {} seconds", self.broadcast, JOB_PERIOD.as_secs());
        Ok(())
    }

    /// Bring up the broadcast job, inbound consumption and the keep-alive listener.
    pub fn start(&self, keepalive_addr: &str) -> Result<()> {
        self.start_broadcast()?;
        self.supervisor.connect()?;
        KeepAliveListener::start(keepalive_addr)?;
        info!("Bot is running. Send /start to begin receiving updates");
        Ok(())
    }

    /// Start, unless shutdown was requested while startup was in progress, then
    /// route inbound events until shutdown.
    pub fn serve(&self, keepalive_addr: &str, inbound: &Receiver<InboundEvent>, shutdown: &Receiver<()>) -> Result<()> {
        if shutdown.try_recv().is_ok() {
            info!("Shutdown requested during startup, not starting");
            return Ok(());
        }
        self.start(keepalive_addr)?;
        self.run(inbound, shutdown);
        Ok(())
    }

    /// Route inbound events until a shutdown signal arrives.
    pub fn run(&self, inbound: &Receiver<InboundEvent>, shutdown: &Receiver<()>) {
        loop {
            select! {
                recv(shutdown) -> _ => {
                    info!("Shutting down...");
                    break;
                }
                recv(inbound) -> event => match event {
                    Ok(InboundEvent::Command(command)) => self.spawn_handler(command),
                    Ok(InboundEvent::Fault(fault)) => self.spawn_recovery(fault),
                    Err(e) => {
                        warn!("Inbound event channel closed: {}", e);
                        break;
                    }
                }
            }
        }
    }

    fn spawn_handler(&self, command: CommandEvent) {
        let dispatcher = Arc::clone(&self.dispatcher);
        let spawned = thread::Builder::new()
            .name(format!("command-{}", command.conversation_id))
            .spawn(move || dispatcher.handle(&command));
        if let Err(e) = spawned {
            error!("Failed to spawn command handler: {}", e);
        }
    }

    fn spawn_recovery(&self, fault: StreamFault) {
        let supervisor = Arc::clone(&self.supervisor);
        let spawned = thread::Builder::new()
            .name("recovery".into())
            .spawn(move || match supervisor.handle_fault(&fault) {
                Ok(outcome) => debug!("Fault handled: {:?}", outcome),
                Err(e) => error!("Failed to restart polling: {}", e),
            });
        if let Err(e) = spawned {
            error!("Failed to spawn recovery: {}", e);
        }
    }

    /// Release everything in a fixed order: broadcast job, conversation jobs,
    /// the registry itself, the inbound stream, then the instance marker.
    pub fn shutdown(&self, guard: &InstanceGuard) -> Vec<StepOutcome> {
        let registry = &self.registry;
        ShutdownSequence::new()
            .step("stop broadcast job", || registry.stop_job(&JobKey::Broadcast).map(|_| ()))
            .step("stop conversation jobs", || {
                let mut outcome = Ok(());
                let conversations = registry
                    .keys()?
                    .into_iter()
                    .filter(|key| matches!(key, JobKey::Conversation(_)));
                for key in conversations {
                    if let Err(e) = registry.stop_job(&key) {
                        warn!("Failed to stop job for {}: {}", key, e);
                        outcome = Err(e);
                    }
                }
                outcome
            })
            .step("close job registry", || registry.stop_all().map(|_| ()))
            .step("release inbound stream", || self.supervisor.release())
            .step("release instance marker", || guard.release())
            .run()
    }
}

/// Wire the production components, run until shutdown, then release everything.
pub fn launch(args: &Args, guard: &InstanceGuard, shutdown: Receiver<()>) -> Result<()> {
    let api = Arc::new(TelegramApi::new(&args.token));
    let me = api.get_me()?;
    info!(
        "Bot connected: @{} (id {})",
        me.username.as_deref().unwrap_or("unknown"),
        me.id
    );

    let provider = provider_for(args.provider, args.cmc_api_key.clone());
    info!("Testing {} API...", provider.name());
    let fetcher = DataFetcher::new(provider);
    let sample = fetcher.fetch_rankings(DISPLAY_COUNT);
    if sample.is_empty() {
        warn!("API test failed, but continuing...");
    } else {
        info!("API test successful - got {} cryptos", sample.len());
    }

    let pipeline = Arc::new(DigestPipeline::new(
        fetcher,
        DigestFormatter::new(args.promoted_channel.clone()),
        DeliveryChannel::new(api.clone()),
    ));
    let registry = Arc::new(JobRegistry::new(Arc::new(ThreadScheduler)));
    let dispatcher = Arc::new(Dispatcher::new(
        registry.clone(),
        pipeline.clone(),
        args.channel.clone(),
        args.promoted_channel.clone(),
    ));
    let (inbound_tx, inbound_rx) = unbounded::<InboundEvent>();
    let poller = Arc::new(UpdatePoller::new(api, inbound_tx, LONG_POLL_SECS, POLL_INTERVAL));
    let supervisor = Arc::new(ConnectionSupervisor::new(poller, RecoveryDelays::default()));
    let agent = Agent::new(registry, pipeline, dispatcher, supervisor, args.channel.clone());

    let served = agent.serve(&addr("0.0.0.0", args.port), &inbound_rx, &shutdown);
    if let Err(e) = &served {
        error!("Startup failed: {}", e);
    }

    let failed = agent.shutdown(guard).iter().filter(|o| o.result.is_err()).count();
    if failed == 0 {
        info!("Shutdown complete");
    } else {
        warn!("Shutdown finished with {} failed step(s)", failed);
    }
    served
}
