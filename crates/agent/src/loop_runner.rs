//! The generation loop implementation.
//!
//! One `generate` call is one turn: append the caller's transcript delta,
//! bound the transcript, stream the model's JSON reply through the
//! extractor, dispatch at most one tool, and finalize the reply record.
//!
//! The pipeline is single-flight — a turn lock serializes `generate` calls,
//! and the transcript/state pair is only ever mutated from inside it.

use std::sync::{Arc, Mutex as StdMutex};

use confab_config::AppConfig;
use confab_core::error::{Error, Result};
use confab_core::memory::FactSink;
use confab_core::provider::{ChatMessage, ChatModel, ChatRequest, Summarizer};
use confab_core::reply::{ReplyState, StructuredReply, ToolCall};
use confab_core::state::AgentState;
use confab_core::tool::ToolKind;
use confab_core::turn::Turn;
use confab_memory::{FactStore, SummarizationPolicy, TranscriptStore};
use confab_providers::{LlmSummarizer, MistralClient};
use tracing::{debug, info, warn};

use crate::dispatch::ToolDispatcher;
use crate::extract::{Field, StreamExtractor};
use crate::schema::SchemaGate;

/// Lifecycle phases of one generation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Thinking,
    ToolPending,
    Replying,
    Done,
}

/// The frozen result of one generation turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// The reply: a message, intentional silence, or pending (feedback turn).
    pub reply: ReplyState,

    /// Who the reply is addressed to, when there is one.
    pub target_user: Option<String>,

    /// Files to deliver alongside the reply.
    pub attachments: Vec<String>,

    /// The tool that ran this turn, if any.
    pub tool: Option<ToolKind>,

    /// A feedback-required tool ran: the caller must start a fresh turn so
    /// the model can read the result before replying.
    pub followup_required: bool,

    /// Snapshot of the agent state after the turn.
    pub state: AgentState,
}

/// Per-turn working record, frozen when the turn completes.
#[derive(Debug, Default)]
struct WorkingReply {
    tool: Option<ToolCall>,
    reply: ReplyState,
    target_user: Option<String>,
    attachments: Vec<String>,
    unknown_fact: Option<String>,
    summary: Option<String>,
}

/// The conversational agent loop.
pub struct AgentLoop {
    model: Arc<dyn ChatModel>,
    model_name: String,
    temperature: f32,
    transcript: Arc<TranscriptStore>,
    summarizer: Arc<dyn Summarizer>,
    policy: SummarizationPolicy,
    gate: SchemaGate,
    dispatcher: ToolDispatcher,
    facts: Option<Arc<dyn FactSink>>,
    state: StdMutex<AgentState>,
    turn_lock: tokio::sync::Mutex<()>,
}

impl AgentLoop {
    pub fn new(
        model: Arc<dyn ChatModel>,
        model_name: impl Into<String>,
        temperature: f32,
        transcript: Arc<TranscriptStore>,
        summarizer: Arc<dyn Summarizer>,
        dispatcher: ToolDispatcher,
    ) -> Self {
        Self {
            model,
            model_name: model_name.into(),
            temperature,
            transcript,
            summarizer,
            policy: SummarizationPolicy::new(15, 10),
            gate: SchemaGate::default(),
            dispatcher,
            facts: None,
            state: StdMutex::new(AgentState::default()),
            turn_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Wire a full agent from configuration: Mistral chat stream, file-backed
    /// transcript and facts, and the built-in tool registry.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let model: Arc<dyn ChatModel> = Arc::new(MistralClient::from_config(config)?);
        let transcript = Arc::new(TranscriptStore::new(
            config.system_prompt.clone(),
            Some(config.context.transcript_path.clone()),
        ));
        let summarizer = Arc::new(LlmSummarizer::new(Arc::clone(&model), config.model.clone()));
        let dispatcher = ToolDispatcher::new(confab_tools::registry_from_config(config));
        let facts = Arc::new(FactStore::new(config.context.facts_path.clone()));

        Ok(Self::new(
            model,
            config.model.clone(),
            config.temperature,
            transcript,
            summarizer,
            dispatcher,
        )
        .with_policy(SummarizationPolicy::new(
            config.context.summarize_threshold,
            config.context.digest_oldest,
        ))
        .with_gate(SchemaGate::new(config.tools.single_use.iter().copied()))
        .with_facts(facts))
    }

    pub fn with_policy(mut self, policy: SummarizationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_gate(mut self, gate: SchemaGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_facts(mut self, facts: Arc<dyn FactSink>) -> Self {
        self.facts = Some(facts);
        self
    }

    /// The transcript this loop reads and appends to.
    pub fn transcript(&self) -> &Arc<TranscriptStore> {
        &self.transcript
    }

    /// Snapshot of the current agent state.
    pub fn state(&self) -> AgentState {
        self.state.lock().expect("state lock").clone()
    }

    /// Run one generation turn.
    ///
    /// Appends the caller's new turns, then drives the model stream until a
    /// reply completes, a feedback-required tool suspends the turn, or the
    /// stream ends. A stream that ends with nothing extracted is
    /// [`Error::EmptyGeneration`] — retryable, the transcript is not rolled
    /// back.
    pub async fn generate(&self, delta: Vec<Turn>) -> Result<TurnOutcome> {
        let _turn = self.turn_lock.lock().await;

        for turn in delta {
            self.transcript.append(turn).await;
        }

        self.state.lock().expect("state lock").begin_turn();

        // Bound the transcript before building the outbound message list.
        if let Err(e) = self.policy.compact(&self.transcript, self.summarizer.as_ref()).await {
            warn!(error = %e, "Summarization failed, continuing without compression");
        }

        let mut usage = self.state.lock().expect("state lock").tool_usage.clone();
        let schema = self.gate.schema_for(&usage);

        let turns = self.transcript.snapshot().await;
        let request = ChatRequest {
            model: self.model_name.clone(),
            messages: turns.iter().map(ChatMessage::from).collect(),
            temperature: self.temperature,
            tool_schema: schema.clone(),
        };

        info!(messages = request.messages.len(), "Starting generation turn");
        let mut rx = self.model.stream(request).await?;

        let mut extractor = StreamExtractor::new();
        let mut record = WorkingReply::default();
        let mut phase = Phase::Thinking;
        let mut followup_required = false;

        'stream: while let Some(item) = rx.recv().await {
            let chunk = match item {
                Ok(chunk) => chunk,
                Err(e) => {
                    // Treated like an early end of stream; whatever was
                    // extracted so far still counts.
                    warn!(error = %e, "Stream interrupted");
                    break 'stream;
                }
            };
            if chunk.done {
                break 'stream;
            }
            let Some(text) = chunk.content else { continue };

            for (field, value) in extractor.feed(&text) {
                match field {
                    Field::Tool => {
                        if value.is_null() {
                            continue;
                        }
                        let call: ToolCall = match serde_json::from_value(value) {
                            Ok(call) => call,
                            Err(e) => {
                                warn!(error = %e, "Undecodable tool payload");
                                self.transcript
                                    .append(Turn::tool(format!(
                                        "Error: undecodable tool payload: {e}"
                                    )))
                                    .await;
                                continue;
                            }
                        };

                        if !schema.allows(call.kind()) {
                            warn!(tool = %call.kind(), "Model proposed unavailable tool");
                            self.transcript
                                .append(Turn::tool(format!(
                                    "[{}] Error: tool not available this turn",
                                    call.kind()
                                )))
                                .await;
                            continue;
                        }

                        phase = Phase::ToolPending;
                        debug!(
                            tool = %call.kind(),
                            feedback = call.is_feedback_required(),
                            "Tool field completed"
                        );
                        record.tool = Some(call.clone());

                        if call.is_feedback_required() {
                            // Abandon the rest of the stream and block on the
                            // collaborator; the result goes back to the model
                            // on the caller's next turn.
                            drop(rx);
                            let result = self.dispatcher.dispatch(&call, &mut usage).await;
                            self.transcript.append(result.turn).await;
                            followup_required = true;
                            break 'stream;
                        }

                        let result = self.dispatcher.dispatch(&call, &mut usage).await;
                        record.attachments.extend(result.attachments.iter().cloned());
                        self.transcript.append(result.turn).await;
                        phase = Phase::Thinking;
                    }
                    Field::TargetUser => {
                        record.target_user = value.as_str().map(str::to_string);
                        if record.target_user.is_some() {
                            phase = Phase::Replying;
                            self.state.lock().expect("state lock").replying = true;
                        }
                    }
                    Field::Reply => {
                        record.reply = ReplyState::from_extracted(value.as_str());
                        phase = Phase::Done;
                    }
                    Field::Attachments => {
                        if let Some(items) = value.as_array() {
                            record.attachments.extend(
                                items.iter().filter_map(|v| v.as_str()).map(str::to_string),
                            );
                        }
                    }
                    Field::UnknownFact => {
                        record.unknown_fact = value.as_str().map(str::to_string);
                    }
                    Field::Summary => {
                        record.summary = value.as_str().map(str::to_string);
                    }
                }
            }
        }

        // Lifetime counters survive the turn whatever happens next.
        self.state.lock().expect("state lock").tool_usage = usage;

        if followup_required {
            // Reply is forced empty for this cycle; control returns to the
            // caller for a fresh generation with the tool result in context.
            let snapshot = {
                let mut st = self.state.lock().expect("state lock");
                st.thinking = true;
                st.replying = false;
                st.done = false;
                st.clone()
            };
            debug!(phase = ?phase, "Turn suspended for tool feedback");
            return Ok(TurnOutcome {
                reply: ReplyState::Silent,
                target_user: None,
                attachments: Vec::new(),
                tool: record.tool.as_ref().map(ToolCall::kind),
                followup_required: true,
                state: snapshot,
            });
        }

        if record.reply.is_pending() {
            debug!(phase = ?phase, "Stream ended without a completed reply");
            let mut st = self.state.lock().expect("state lock");
            st.thinking = false;
            st.replying = false;
            // `done` stays false: the caller may retry the whole turn.
            return Err(Error::EmptyGeneration);
        }

        // Freeze and normalize the decoded record.
        let mut decoded = StructuredReply {
            tool: record.tool.clone(),
            reply: record.reply.message().map(str::to_string),
            target_user: record.target_user.clone(),
            attachments: record.attachments.clone(),
            unknown_fact: record.unknown_fact.clone(),
            summary: record.summary.clone(),
            ..Default::default()
        };
        if let Err(e) = decoded.normalize() {
            let mut st = self.state.lock().expect("state lock");
            st.thinking = false;
            st.replying = false;
            return Err(e.into());
        }

        // Terminal bookkeeping.
        if let Some(text) = decoded.reply.as_deref().filter(|t| !t.is_empty()) {
            self.transcript.append(Turn::assistant(text)).await;
        }
        if let (Some(sink), Some(fact)) = (&self.facts, &decoded.unknown_fact) {
            // Fire-and-forget: a failed write never fails the turn.
            if let Err(e) = sink.record_fact(fact).await {
                warn!(error = %e, "Failed to record learned fact");
            }
        }
        if let Some(summary) = &decoded.summary {
            self.transcript.set_summary(summary.clone()).await;
        }

        let snapshot = {
            let mut st = self.state.lock().expect("state lock");
            st.thinking = false;
            st.replying = false;
            st.done = true;
            st.clone()
        };
        debug!(phase = ?phase, "Generation turn complete");

        Ok(TurnOutcome {
            reply: ReplyState::from_extracted(decoded.reply.as_deref()),
            target_user: decoded.target_user,
            attachments: decoded.attachments,
            tool: decoded.tool.as_ref().map(ToolCall::kind),
            followup_required: false,
            state: snapshot,
        })
    }
}
