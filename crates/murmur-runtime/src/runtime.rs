//! The composition root: agent registry, swarms, supervision loops, and
//! the start/stop lifecycle.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval, interval_at, sleep};
use tracing::{debug, error, info, warn};

use murmur_core::agent::{Agent, AgentId, AgentState, MessageQueue, SharedState};
use murmur_core::config::RuntimeConfig;
use murmur_core::error::{RuntimeError, RuntimeResult};
use murmur_core::event::{EventBus, HealthReport, RuntimeEvent};
use murmur_core::message::AgentMessage;
use murmur_core::metrics::{MetricsExporter, RuntimeMetrics};

use crate::scheduler::TaskScheduler;
use crate::swarm::Swarm;
use crate::task::SubmitOptions;
use crate::worker::WorkerInfo;

/// Shared-state key under which health reports are published.
pub const HEALTH_TOPIC: &str = "runtime.health";

/// The agent orchestration runtime.
///
/// Owns the agent and swarm registries, the task scheduler, and the
/// supervision loops (heartbeat, health, metrics, dispatch). Construct
/// with [`AgentRuntime::new`], register agents, then [`start`] it; call
/// [`stop`] for a graceful drain-and-shutdown.
///
/// [`start`]: AgentRuntime::start
/// [`stop`]: AgentRuntime::stop
pub struct AgentRuntime {
    config: RuntimeConfig,
    agents: Arc<DashMap<AgentId, Arc<dyn Agent>>>,
    swarms: DashMap<String, Swarm>,
    scheduler: Arc<TaskScheduler>,
    shared_state: SharedState,
    message_queue: MessageQueue,
    message_rx: Mutex<Option<mpsc::UnboundedReceiver<AgentMessage>>>,
    events: EventBus<RuntimeEvent>,
    exporters: RwLock<Vec<Arc<dyn MetricsExporter>>>,
    running: AtomicBool,
    shutting_down: AtomicBool,
    loops: Mutex<Vec<JoinHandle<()>>>,
}

impl AgentRuntime {
    /// Build a runtime from configuration.
    pub fn new(config: RuntimeConfig) -> Arc<Self> {
        let agents: Arc<DashMap<AgentId, Arc<dyn Agent>>> = Arc::new(DashMap::new());
        let events = EventBus::default();
        let scheduler = Arc::new(TaskScheduler::new(
            config.clone(),
            Arc::clone(&agents),
            events.clone(),
        ));
        let (message_queue, message_rx) = MessageQueue::new();
        Arc::new(Self {
            config,
            agents,
            swarms: DashMap::new(),
            scheduler,
            shared_state: SharedState::new(),
            message_queue,
            message_rx: Mutex::new(Some(message_rx)),
            events,
            exporters: RwLock::new(Vec::new()),
            running: AtomicBool::new(false),
            shutting_down: AtomicBool::new(false),
            loops: Mutex::new(Vec::new()),
        })
    }

    /// Boot shared middleware: idempotent, emits `Initialized`.
    pub async fn initialize(&self) -> RuntimeResult<()> {
        debug!("Runtime initialized");
        self.events.publish(RuntimeEvent::Initialized);
        Ok(())
    }

    /// Event bus carrying [`RuntimeEvent`]s.
    pub fn events(&self) -> &EventBus<RuntimeEvent> {
        &self.events
    }

    /// The shared state handle injected into every agent.
    pub fn shared_state(&self) -> &SharedState {
        &self.shared_state
    }

    /// Take the receiving end of the agent message queue.
    ///
    /// The external router drains this; it can be taken exactly once.
    pub fn take_message_receiver(&self) -> Option<mpsc::UnboundedReceiver<AgentMessage>> {
        self.message_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Register a metrics sink; effective from the next collection.
    pub fn add_exporter(&self, exporter: Arc<dyn MetricsExporter>) {
        self.exporters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(exporter);
    }

    /// Whether the runtime's periodic activities are running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Register an agent and bring it up.
    ///
    /// Enforces the agent cap and id uniqueness, injects the shared
    /// state and message-queue handles, then initializes and starts the
    /// agent. The agent becomes visible to the scheduler only after the
    /// whole sequence succeeds.
    pub async fn register_agent(&self, agent: Arc<dyn Agent>) -> RuntimeResult<()> {
        if self.shutting_down.load(Ordering::SeqCst) {
            return Err(RuntimeError::NotRunning);
        }
        if self.agents.len() >= self.config.max_agents {
            return Err(RuntimeError::MaxAgentsReached {
                max: self.config.max_agents,
            });
        }
        let id = agent.id().clone();
        if self.agents.contains_key(&id) {
            return Err(RuntimeError::DuplicateAgent { id: id.to_string() });
        }

        agent.set_shared_state(self.shared_state.clone());
        agent.set_message_queue(self.message_queue.clone());
        agent.initialize().await?;
        agent.start().await?;

        self.agents.insert(id.clone(), agent);
        info!(agent_id = %id, "Agent registered");
        self.events
            .publish(RuntimeEvent::AgentRegistered { agent_id: id });
        Ok(())
    }

    /// Stop an agent and remove it from the registry and all swarms.
    pub async fn unregister_agent(&self, id: &AgentId) -> RuntimeResult<()> {
        let agent = self
            .agents
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| RuntimeError::UnknownAgent { id: id.to_string() })?;

        agent.stop().await?;
        self.agents.remove(id);
        for mut swarm in self.swarms.iter_mut() {
            swarm.remove_member(id);
        }
        info!(agent_id = %id, "Agent unregistered");
        self.events.publish(RuntimeEvent::AgentUnregistered {
            agent_id: id.clone(),
        });
        Ok(())
    }

    /// Look up a registered agent.
    pub fn agent(&self, id: &AgentId) -> RuntimeResult<Arc<dyn Agent>> {
        self.agents
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| RuntimeError::UnknownAgent { id: id.to_string() })
    }

    /// Number of registered agents.
    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    /// Create a named swarm over already-registered agents.
    pub fn create_swarm(
        &self,
        name: impl Into<String>,
        members: Vec<AgentId>,
    ) -> RuntimeResult<()> {
        let name = name.into();
        for member in &members {
            if !self.agents.contains_key(member) {
                return Err(RuntimeError::UnknownAgent {
                    id: member.to_string(),
                });
            }
        }
        if self.swarms.contains_key(&name) {
            return Err(RuntimeError::DuplicateSwarm { name });
        }
        let size = members.len();
        self.swarms
            .insert(name.clone(), Swarm::new(name.clone(), members));
        self.events.publish(RuntimeEvent::SwarmCreated {
            name,
            members: size,
        });
        Ok(())
    }

    /// Look up a swarm by name.
    pub fn swarm(&self, name: &str) -> Option<Swarm> {
        self.swarms.get(name).map(|entry| entry.value().clone())
    }

    /// Fan a message out as one task per swarm member.
    ///
    /// Returns the submitted task ids in member order.
    pub fn submit_to_swarm(
        &self,
        name: &str,
        message: &AgentMessage,
    ) -> RuntimeResult<Vec<String>> {
        let swarm = self.swarm(name).ok_or_else(|| RuntimeError::UnknownSwarm {
            name: name.to_string(),
        })?;
        let mut task_ids = Vec::with_capacity(swarm.len());
        for member in swarm.members() {
            let mut fanned = message.clone().addressed_to(member.clone());
            fanned.id = uuid::Uuid::new_v4().to_string();
            task_ids.push(self.submit_task(fanned, SubmitOptions::target(member.clone()))?);
        }
        Ok(task_ids)
    }

    /// Submit a message for scheduled execution, returning the task id.
    pub fn submit_task(
        &self,
        message: AgentMessage,
        opts: SubmitOptions,
    ) -> RuntimeResult<String> {
        if self.shutting_down.load(Ordering::SeqCst) {
            return Err(RuntimeError::NotRunning);
        }
        self.scheduler.submit(message, opts)
    }

    /// Number of tasks waiting in the pending queue.
    pub fn queued_tasks(&self) -> usize {
        self.scheduler.queued_len()
    }

    /// Number of tasks currently executing.
    pub fn active_tasks(&self) -> usize {
        self.scheduler.active_len()
    }

    /// Copy of the worker table.
    pub fn workers(&self) -> Vec<WorkerInfo> {
        self.scheduler.workers()
    }

    /// Start the periodic activities: dispatch, heartbeat, health
    /// sampling, and (when enabled) metrics collection. Idempotent.
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut loops = self.loops.lock().unwrap_or_else(PoisonError::into_inner);

        let scheduler = Arc::clone(&self.scheduler);
        let dispatch_period = self.config.dispatch_interval();
        loops.push(tokio::spawn(async move {
            let mut tick = interval(dispatch_period);
            loop {
                tick.tick().await;
                scheduler.dispatch_ready();
            }
        }));

        // Supervision loops fire after one full period, not immediately.
        let runtime = Arc::downgrade(self);
        let heartbeat_period = self.config.heartbeat_interval();
        loops.push(tokio::spawn(async move {
            let mut tick = interval_at(Instant::now() + heartbeat_period, heartbeat_period);
            loop {
                tick.tick().await;
                let Some(runtime) = runtime.upgrade() else { break };
                runtime.broadcast_heartbeat().await;
            }
        }));

        let runtime = Arc::downgrade(self);
        let health_period = self.config.health_check_interval();
        loops.push(tokio::spawn(async move {
            let mut tick = interval_at(Instant::now() + health_period, health_period);
            loop {
                tick.tick().await;
                let Some(runtime) = runtime.upgrade() else { break };
                runtime.run_health_check();
            }
        }));

        if self.config.metrics.enabled {
            let runtime = Arc::downgrade(self);
            let metrics_period = self.config.metrics_interval();
            loops.push(tokio::spawn(async move {
                let mut tick = interval_at(Instant::now() + metrics_period, metrics_period);
                loop {
                    tick.tick().await;
                    let Some(runtime) = runtime.upgrade() else { break };
                    runtime.collect_metrics();
                }
            }));
        }

        info!("Runtime started");
        self.events.publish(RuntimeEvent::Started);
    }

    /// Graceful drain-and-shutdown. Idempotent and re-entrant-safe.
    ///
    /// Cancels the periodic activities immediately, waits for active
    /// tasks to drain within the configured timeout, force-stops agents
    /// still running past the deadline (in-flight tasks are abandoned,
    /// not cancelled), then stops every registered agent. A drain
    /// timeout never surfaces as an error.
    pub async fn stop(&self) {
        if !self.running.load(Ordering::SeqCst) {
            return;
        }
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Runtime shutdown initiated");
        self.events.publish(RuntimeEvent::ShutdownInitiated);

        {
            let mut loops = self.loops.lock().unwrap_or_else(PoisonError::into_inner);
            for handle in loops.drain(..) {
                handle.abort();
            }
        }

        let deadline = Instant::now() + self.config.graceful_shutdown_timeout();
        while self.scheduler.active_len() > 0 && Instant::now() < deadline {
            sleep(std::time::Duration::from_millis(10)).await;
        }

        if self.scheduler.active_len() > 0 {
            let mut aborted = Vec::new();
            for entry in self.agents.iter() {
                if entry.value().state() == AgentState::Running {
                    aborted.push(entry.key().clone());
                }
            }
            warn!(
                stranded_tasks = self.scheduler.active_len(),
                agents = aborted.len(),
                "Drain timed out, force-stopping running agents"
            );
            for id in &aborted {
                if let Ok(agent) = self.agent(id)
                    && let Err(e) = agent.stop().await
                {
                    error!(agent_id = %id, error = %e, "Force-stop failed");
                }
            }
            self.events.publish(RuntimeEvent::ForceShutdown {
                aborted_agents: aborted,
            });
        }

        let agents: Vec<(AgentId, Arc<dyn Agent>)> = self
            .agents
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();
        for (id, agent) in agents {
            if agent.state() == AgentState::Stopped {
                continue;
            }
            if let Err(e) = agent.stop().await {
                error!(agent_id = %id, error = %e, "Agent stop failed during shutdown");
            }
        }

        self.running.store(false, Ordering::SeqCst);
        self.shutting_down.store(false, Ordering::SeqCst);
        info!("Runtime stopped");
        self.events.publish(RuntimeEvent::Stopped);
    }

    /// Send every registered agent a background-priority heartbeat.
    ///
    /// A delivery failure is reported per-agent and never interrupts the
    /// rest of the broadcast.
    async fn broadcast_heartbeat(&self) {
        let agents: Vec<(AgentId, Arc<dyn Agent>)> = self
            .agents
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();
        for (id, agent) in agents {
            let probe = AgentMessage::heartbeat(id.clone());
            if let Err(e) = agent.submit_task(probe).await {
                warn!(agent_id = %id, error = %e, "Heartbeat delivery failed");
                self.events.publish(RuntimeEvent::HeartbeatFailed {
                    agent_id: id,
                    reason: e.to_string(),
                });
            }
        }
    }

    /// Sample every agent's state, publish the report on the shared
    /// state under [`HEALTH_TOPIC`], and emit it as an event.
    fn run_health_check(&self) {
        let mut states = HashMap::new();
        for entry in self.agents.iter() {
            states.insert(entry.key().to_string(), entry.value().state());
        }
        let report = HealthReport {
            states,
            sampled_at: Utc::now(),
        };
        match serde_json::to_value(&report) {
            Ok(value) => self.shared_state.set(HEALTH_TOPIC, value),
            Err(e) => error!(error = %e, "Failed to serialize health report"),
        }
        self.events.publish(RuntimeEvent::HealthCheck { report });
    }

    /// Aggregate counters and hand the snapshot to every exporter.
    fn collect_metrics(&self) {
        let stats = self.scheduler.stats();
        let mut running = 0;
        let mut idle = 0;
        let mut error = 0;
        for entry in self.agents.iter() {
            match entry.value().state() {
                AgentState::Running => running += 1,
                AgentState::Idle => idle += 1,
                AgentState::Error => error += 1,
                _ => {}
            }
        }
        let metrics = RuntimeMetrics {
            agents_total: self.agents.len(),
            agents_running: running,
            agents_idle: idle,
            agents_error: error,
            tasks_queued: stats.tasks_queued,
            tasks_active: stats.tasks_active,
            tasks_completed: stats.tasks_completed,
            workers_busy: stats.workers_busy,
            workers_idle: stats.workers_idle,
            collected_at: Utc::now(),
        };
        for exporter in self
            .exporters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
        {
            exporter.export(&metrics);
        }
        self.events
            .publish(RuntimeEvent::MetricsCollected { metrics });
    }
}

impl std::fmt::Debug for AgentRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRuntime")
            .field("agents", &self.agents.len())
            .field("swarms", &self.swarms.len())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}
