/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Implementation of the `submit` commands.
//!
//! Tasks are written straight into the server's local store; the server picks
//! them up on its next queue check.

use anyhow::{anyhow, Context, Result};
use clap::{Subcommand, ValueEnum};
use std::sync::Arc;
use tracing::info;

use aftercast::clock::Clock;
use aftercast::config::AftercastConfig;
use aftercast::database::AccessLevel;
use aftercast::dispatcher::{
    AnalystRequest, ConsoleMessage, DispatchHandle, IntakeRequest, LocalDistributor, Payload,
    RelayModeRequest,
};
use aftercast::relay::RelayMode;
use aftercast::timeline::{AnalystOptions, IntakeOption, ShadowOption};

use super::open_store;

const SUBMIT_ID: &str = "aftercastctl";

#[derive(Subcommand)]
pub enum SubmitCommand {
    /// Stop the server after the tasks already due
    Shutdown,
    /// Write a message to the server log
    Console { message: String },
    /// Start or stop the catalog poll job
    Poll {
        #[arg(value_enum)]
        action: JobAction,
    },
    /// Start or stop the cleanup job
    Cleanup {
        #[arg(value_enum)]
        action: JobAction,
    },
    /// Change the relay mode negotiated between the two servers
    RelayMode {
        /// "solo" or "dual"
        mode: String,
        /// Server number that should be primary
        primary: i32,
    },
    /// Start tracking an event
    Intake { event_id: String },
    /// Apply analyst options to an event on both servers
    Analyst {
        event_id: String,

        #[arg(long, default_value = "admin")]
        analyst_id: String,

        #[arg(long, value_enum, default_value_t = IntakeArg::Normal)]
        intake: IntakeArg,

        #[arg(long, value_enum, default_value_t = ShadowArg::Normal)]
        shadow: ShadowArg,

        #[arg(long, default_value = "")]
        remark: String,

        /// Model parameter overrides as a JSON object
        #[arg(long)]
        params: Option<String>,
    },
    /// Control the health monitor
    Health {
        #[arg(value_enum)]
        action: HealthAction,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum JobAction {
    Start,
    Stop,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum HealthAction {
    Reset,
    Start,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum IntakeArg {
    Normal,
    Allow,
    Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ShadowArg {
    Normal,
    Ignore,
}

impl From<IntakeArg> for IntakeOption {
    fn from(arg: IntakeArg) -> Self {
        match arg {
            IntakeArg::Normal => IntakeOption::Normal,
            IntakeArg::Allow => IntakeOption::Allow,
            IntakeArg::Block => IntakeOption::Block,
        }
    }
}

impl From<ShadowArg> for ShadowOption {
    fn from(arg: ShadowArg) -> Self {
        match arg {
            ShadowArg::Normal => ShadowOption::Normal,
            ShadowArg::Ignore => ShadowOption::Ignore,
        }
    }
}

/// Translates a command into `(event_id, payload)`; `None` means a control task.
fn payload_for(command: SubmitCommand) -> Result<(Option<String>, Payload)> {
    let submission = match command {
        SubmitCommand::Shutdown => (None, Payload::Shutdown),
        SubmitCommand::Console { message } => {
            (None, Payload::ConsoleMessage(ConsoleMessage { message }))
        }
        SubmitCommand::Poll { action } => match action {
            JobAction::Start => (None, Payload::PollStart),
            JobAction::Stop => (None, Payload::PollStop),
        },
        SubmitCommand::Cleanup { action } => match action {
            JobAction::Start => (None, Payload::CleanupStart),
            JobAction::Stop => (None, Payload::CleanupStop),
        },
        SubmitCommand::RelayMode { mode, primary } => {
            let relay_mode = mode.parse::<RelayMode>().map_err(|e| anyhow!(e))?;
            if !(1..=2).contains(&primary) {
                return Err(anyhow!("primary must be 1 or 2, got {}", primary));
            }
            (
                None,
                Payload::SetRelayMode(RelayModeRequest {
                    relay_mode,
                    configured_primary: primary,
                }),
            )
        }
        SubmitCommand::Intake { event_id } => {
            (Some(event_id), Payload::IntakeSync(IntakeRequest::default()))
        }
        SubmitCommand::Analyst {
            event_id,
            analyst_id,
            intake,
            shadow,
            remark,
            params,
        } => {
            let model_params = params
                .map(|raw| serde_json::from_str::<serde_json::Value>(&raw))
                .transpose()
                .context("--params is not valid JSON")?;
            let options = AnalystOptions {
                analyst_id,
                remark,
                // Stamped by the server when it handles the request.
                option_time: 0,
                intake_option: intake.into(),
                shadow_option: shadow.into(),
                model_params,
            };
            (
                Some(event_id),
                Payload::AnalystIntervene(AnalystRequest { options }),
            )
        }
        SubmitCommand::Health { action } => match action {
            HealthAction::Reset => (None, Payload::HealthMonitorReset),
            HealthAction::Start => (None, Payload::HealthMonitorStart),
            HealthAction::Stop => (None, Payload::HealthMonitorStop),
        },
    };
    Ok(submission)
}

pub async fn run(config: &AftercastConfig, command: SubmitCommand) -> Result<()> {
    let (event_id, payload) = payload_for(command)?;
    let store = open_store(&config.server.db_url, AccessLevel::ReadWrite).await?;
    let dispatch = DispatchHandle::new(
        store,
        Clock::system(),
        Arc::new(LocalDistributor::new()),
        SUBMIT_ID,
    );

    let task_id = match &event_id {
        Some(event_id) => {
            dispatch
                .submit(event_id, dispatch.clock().now(), &payload)
                .await
        }
        None => dispatch.submit_control(&payload).await,
    }
    .context("Failed to submit task")?;

    info!(%task_id, opcode = %payload.opcode(), "Task submitted");
    println!("{} {}", task_id, payload.opcode());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use aftercast::dispatcher::Opcode;

    #[test]
    fn test_control_commands_have_no_event() {
        let (event_id, payload) = payload_for(SubmitCommand::Poll {
            action: JobAction::Stop,
        })
        .unwrap();
        assert!(event_id.is_none());
        assert_eq!(payload.opcode(), Opcode::PollStop);
    }

    #[test]
    fn test_relay_mode_is_validated() {
        assert!(payload_for(SubmitCommand::RelayMode {
            mode: "triple".to_string(),
            primary: 1,
        })
        .is_err());
        assert!(payload_for(SubmitCommand::RelayMode {
            mode: "solo".to_string(),
            primary: 3,
        })
        .is_err());
        let (_, payload) = payload_for(SubmitCommand::RelayMode {
            mode: "Solo".to_string(),
            primary: 2,
        })
        .unwrap();
        assert_eq!(
            payload,
            Payload::SetRelayMode(RelayModeRequest {
                relay_mode: RelayMode::Solo,
                configured_primary: 2,
            })
        );
    }

    #[test]
    fn test_analyst_params_must_be_json() {
        let command = |params: &str| SubmitCommand::Analyst {
            event_id: "us1000abc".to_string(),
            analyst_id: "jd".to_string(),
            intake: IntakeArg::Block,
            shadow: ShadowArg::Normal,
            remark: String::new(),
            params: Some(params.to_string()),
        };
        assert!(payload_for(command("{not json")).is_err());

        let (event_id, payload) = payload_for(command(r#"{"b": 1.1}"#)).unwrap();
        assert_eq!(event_id.as_deref(), Some("us1000abc"));
        match payload {
            Payload::AnalystIntervene(request) => {
                assert_eq!(request.options.intake_option, IntakeOption::Block);
                assert_eq!(request.options.model_params, Some(serde_json::json!({"b": 1.1})));
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }
}
