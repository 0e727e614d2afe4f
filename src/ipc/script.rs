//! Replay script parsing and execution.
//!
//! A script is a sequence of plists, one per line.  Setup messages load
//! classifier templates and hand-count requirements; `frame` and `poll`
//! messages drive the pipeline with recorded landmarks and timestamps.

use lexpr::Value;
use tracing::{debug, warn};

use super::{
    error_response, event_sexp, flatten_list, get_float, get_int, get_keyword, get_string,
    get_value, list_items, ok_response,
};
use crate::error::ScriptError;
use crate::gesture::classifier::CentroidClassifier;
use crate::gesture::features::{normalize, Orientation};
use crate::gesture::landmarks::{HandObservation, Landmark};
use crate::gesture::policy::HandRequirement;
use crate::pipeline::{PipelineEvent, PipelineState};

/// One parsed script message.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptCommand {
    /// Store the first complete hand as the classifier template for `label`.
    Template {
        label: String,
        observation: HandObservation,
    },
    /// Set the hand-count requirement for `label`.
    Policy {
        label: String,
        requirement: HandRequirement,
    },
    /// Change the expected label.
    Expect { label: String },
    /// Process one camera frame.
    Frame {
        t_ms: f64,
        observation: HandObservation,
    },
    /// Check the hold deadline without a frame.
    Poll { t_ms: f64 },
    Stop,
    Start,
    /// Report pipeline status.
    Status { t_ms: Option<f64> },
    /// Report the active configuration.
    Config,
}

impl ScriptCommand {
    /// Parse a single message line.
    pub fn parse(raw: &str) -> Result<Self, ScriptError> {
        let value = lexpr::from_str(raw).map_err(|e| ScriptError::Parse(e.to_string()))?;
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> Result<Self, ScriptError> {
        let msg_type = get_keyword(value, "type").ok_or(ScriptError::MissingType)?;
        match msg_type.as_str() {
            "template" => Ok(Self::Template {
                label: required_label(value)?,
                observation: parse_hands(value)?,
            }),
            "policy" => {
                let label = required_label(value)?;
                let raw = get_keyword(value, "hands").ok_or(ScriptError::MissingField("hands"))?;
                let requirement =
                    HandRequirement::from_str(&raw).ok_or_else(|| ScriptError::InvalidField {
                        field: "hands",
                        reason: format!("unknown requirement {}", raw),
                    })?;
                Ok(Self::Policy { label, requirement })
            }
            "expect" => Ok(Self::Expect {
                label: required_label(value)?,
            }),
            "frame" => Ok(Self::Frame {
                t_ms: required_time(value)?,
                observation: parse_hands(value)?,
            }),
            "poll" => Ok(Self::Poll {
                t_ms: required_time(value)?,
            }),
            "stop" => Ok(Self::Stop),
            "start" => Ok(Self::Start),
            "status" => Ok(Self::Status {
                t_ms: match get_value(value, "t") {
                    Some(_) => Some(required_time(value)?),
                    None => None,
                },
            }),
            "config" => Ok(Self::Config),
            other => Err(ScriptError::UnknownType(other.to_string())),
        }
    }
}

fn required_label(value: &Value) -> Result<String, ScriptError> {
    match get_string(value, "label") {
        Some(label) if !label.is_empty() && label != "nil" => Ok(label),
        _ => Err(ScriptError::MissingField("label")),
    }
}

fn required_time(value: &Value) -> Result<f64, ScriptError> {
    if get_value(value, "t").is_none() {
        return Err(ScriptError::MissingField("t"));
    }
    match get_float(value, "t") {
        Some(t) if t.is_finite() => Ok(t),
        _ => Err(ScriptError::InvalidField {
            field: "t",
            reason: "expected a number".into(),
        }),
    }
}

/// Parse `:hands ((x y z ...) ...)`.  A missing or `nil` value means no
/// hands were detected.  Hands of the wrong length are kept so the
/// normalizer can skip them.
fn parse_hands(value: &Value) -> Result<HandObservation, ScriptError> {
    let Some(hands) = get_value(value, "hands") else {
        return Ok(HandObservation::empty());
    };
    if matches!(hands, Value::Nil) || matches!(hands, Value::Symbol(s) if s.as_ref() == "nil") {
        return Ok(HandObservation::empty());
    }
    if !matches!(hands, Value::Cons(_) | Value::Null) {
        return Err(ScriptError::InvalidField {
            field: "hands",
            reason: "expected a list of hands".into(),
        });
    }

    let mut parsed = Vec::new();
    for hand in list_items(hands) {
        let coords = flatten_list(hand)
            .into_iter()
            .map(coordinate)
            .collect::<Result<Vec<f32>, _>>()?;
        if coords.len() % 3 != 0 {
            return Err(ScriptError::InvalidField {
                field: "hands",
                reason: format!("{} coordinates is not a multiple of 3", coords.len()),
            });
        }
        parsed.push(
            coords
                .chunks(3)
                .map(|c| Landmark::new(c[0], c[1], c[2]))
                .collect(),
        );
    }
    Ok(HandObservation::new(parsed))
}

fn coordinate(value: &Value) -> Result<f32, ScriptError> {
    match value {
        Value::Number(n) => n.as_f64().map(|f| f as f32).ok_or_else(|| ScriptError::InvalidField {
            field: "hands",
            reason: format!("{} is out of range", n),
        }),
        other => Err(ScriptError::InvalidField {
            field: "hands",
            reason: format!("{} is not a number", other),
        }),
    }
}

// ── Session ────────────────────────────────────────────────

/// Runs script lines against a pipeline and a template classifier.
pub struct ReplaySession {
    pipeline: PipelineState,
    classifier: CentroidClassifier,
    /// Latest timestamp seen, used for status without `:t`.
    last_t_ms: f64,
    lines: u64,
    errors: u64,
}

impl ReplaySession {
    pub fn new(pipeline: PipelineState) -> Self {
        Self {
            pipeline,
            classifier: CentroidClassifier::new(),
            last_t_ms: 0.0,
            lines: 0,
            errors: 0,
        }
    }

    pub fn pipeline(&self) -> &PipelineState {
        &self.pipeline
    }

    pub fn classifier_mut(&mut self) -> &mut CentroidClassifier {
        &mut self.classifier
    }

    /// Messages handled, including failed ones.
    pub fn lines(&self) -> u64 {
        self.lines
    }

    pub fn errors(&self) -> u64 {
        self.errors
    }

    /// Handle one script line, returning the output plists.
    ///
    /// Blank lines and `;` comments produce nothing.  A malformed line
    /// yields a single error response and leaves the session unchanged.
    pub fn handle_line(&mut self, raw: &str) -> Vec<String> {
        let line = raw.trim();
        if line.is_empty() || line.starts_with(';') {
            return Vec::new();
        }
        self.lines += 1;

        let value = match lexpr::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                self.errors += 1;
                warn!(line = self.lines, "malformed s-expression: {}", e);
                return vec![error_response(0, &format!("malformed s-expression: {e}"))];
            }
        };
        let msg_id = get_int(&value, "id").unwrap_or(0);

        match ScriptCommand::from_value(&value) {
            Ok(command) => self.execute(msg_id, command),
            Err(e) => {
                self.errors += 1;
                warn!(line = self.lines, "rejected message: {}", e);
                vec![error_response(msg_id, &e.to_string())]
            }
        }
    }

    /// Apply a parsed command.
    pub fn execute(&mut self, msg_id: i64, command: ScriptCommand) -> Vec<String> {
        match command {
            ScriptCommand::Template { label, observation } => {
                match normalize(&observation, Orientation::Normal) {
                    Some(features) => {
                        self.classifier.add_template(&label, features);
                        vec![ok_response(msg_id)]
                    }
                    None => {
                        self.errors += 1;
                        let e = ScriptError::InvalidField {
                            field: "hands",
                            reason: "no complete hand".into(),
                        };
                        warn!("template {} rejected: {}", label, e);
                        vec![error_response(msg_id, &e.to_string())]
                    }
                }
            }
            ScriptCommand::Policy { label, requirement } => {
                debug!("policy: {} needs {} hand(s)", label, requirement.as_str());
                self.pipeline.policy_mut().set(&label, requirement);
                vec![ok_response(msg_id)]
            }
            ScriptCommand::Expect { label } => render(self.pipeline.set_expected_label(&label)),
            ScriptCommand::Frame { t_ms, observation } => {
                self.last_t_ms = self.last_t_ms.max(t_ms);
                render(
                    self.pipeline
                        .process_frame(&observation, &mut self.classifier, t_ms),
                )
            }
            ScriptCommand::Poll { t_ms } => {
                self.last_t_ms = self.last_t_ms.max(t_ms);
                render(self.pipeline.poll(t_ms))
            }
            ScriptCommand::Stop => render(self.pipeline.stop()),
            ScriptCommand::Start => {
                self.pipeline.start();
                vec![ok_response(msg_id)]
            }
            ScriptCommand::Status { t_ms } => {
                let now = t_ms.unwrap_or(self.last_t_ms);
                vec![format!(
                    "(:type :response :id {} :status :ok :pipeline {})",
                    msg_id,
                    self.pipeline.status_sexp(now)
                )]
            }
            ScriptCommand::Config => vec![format!(
                "(:type :response :id {} :status :ok :config {})",
                msg_id,
                self.pipeline.config().config_sexp()
            )],
        }
    }
}

fn render(events: Vec<PipelineEvent>) -> Vec<String> {
    events.iter().map(event_sexp).collect()
}

// ── Tests ──────────────────────────────────────────────────
