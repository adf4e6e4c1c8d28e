//! Command handling.
//!
//! Each conversation is either subscribed (it has a job in the registry) or not:
//!
//! | state        | command    | effect                                          |
//! |--------------|------------|-------------------------------------------------|
//! | unsubscribed | `/start`   | start job (3 s first run), welcome → subscribed |
//! | subscribed   | `/start`   | job replaced, welcome                           |
//! | subscribed   | `/stop`    | job stopped, confirmation → unsubscribed        |
//! | unsubscribed | `/stop`    | informational reply                             |
//! | any          | `/prices`  | one digest to the conversation                  |
//! | any          | `/channel` | one digest to the broadcast channel, confirmed  |
//!
//! A failing handler never propagates: it is logged and answered with a short
//! per-command failure message.

use crate::delivery::SendOptions;
use crate::model::job_registry::{JobKey, JobRegistry, JobSchedule};
use crate::pipeline::DigestPipeline;
use digest_common::net::{FIRST_DELIVERY_DELAY, JOB_PERIOD};
use digest_common::{CommandEvent, CommandKind, Destination, Result};
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;

/// Routes commands to the job registry and the digest pipeline.
pub struct Dispatcher {
    registry: Arc<JobRegistry>,
    pipeline: Arc<DigestPipeline>,
    broadcast: Destination,
    promoted_channel: Option<String>,
    schedule: JobSchedule,
}

impl Dispatcher {
    /// Dispatcher with the standard subscription schedule.
    pub fn new(
        registry: Arc<JobRegistry>,
        pipeline: Arc<DigestPipeline>,
        broadcast: Destination,
        promoted_channel: Option<String>,
    ) -> Self {
        Self {
            registry,
            pipeline,
            broadcast,
            promoted_channel,
            schedule: JobSchedule::every(JOB_PERIOD).with_first_run(FIRST_DELIVERY_DELAY),
        }
    }

    /// Handle one command. Never fails.
    pub fn handle(&self, event: &CommandEvent) {
        let chat = Destination::Chat(event.conversation_id);
        let result = match event.kind {
            CommandKind::Start => self.start(event, &chat),
            CommandKind::Stop => self.stop(event, &chat),
            CommandKind::Prices => self.prices(&chat),
            CommandKind::Channel => self.channel(&chat),
        };

        if let Err(e) = result {
            error!("Error in /{} command from {}: {}", event.kind, chat, e);
            let reply = self.failure_reply(event.kind);
            if let Err(e) = self.pipeline.delivery().notify(&chat, &reply, SendOptions::plain()) {
                error!("Failed to send error reply to {}: {}", chat, e);
            }
        }
    }

    fn start(&self, event: &CommandEvent, chat: &Destination) -> Result<()> {
        info!("/start command from {} (chat_id: {})", event.sender_name, chat);

        let task = self.pipeline.task(chat.clone(), Some(chat.clone()));
        self.registry
            .start_job(JobKey::Conversation(event.conversation_id), task, self.schedule)?;

        self.pipeline
            .delivery()
            .notify(chat, &self.welcome(&event.sender_name), SendOptions::markdown())?;
        info!("Welcome message sent to {}", chat);
        Ok(())
    }

    fn stop(&self, event: &CommandEvent, chat: &Destination) -> Result<()> {
        info!("/stop command from chat_id: {}", chat);
        if self.registry.stop_job(&JobKey::Conversation(event.conversation_id))? {
            self.pipeline.delivery().notify(
                chat,
                "🛑 **Updates stopped!** Use /start to resume.",
                SendOptions::markdown(),
            )?;
            info!("Jobs stopped successfully for {}", chat);
        } else {
            self.pipeline
                .delivery()
                .notify(chat, "ℹ️ No active updates to stop.", SendOptions::plain())?;
        }
        Ok(())
    }

    fn prices(&self, chat: &Destination) -> Result<()> {
        info!("/prices command from chat_id: {}", chat);
        self.pipeline
            .delivery()
            .notify(chat, "🔄 Fetching current prices...", SendOptions::plain())?;

        // the requester already got the fallback notice on failure
        if let Err(e) = self.pipeline.run(chat, Some(chat)) {
            warn!("Immediate prices for {} not delivered: {}", chat, e);
        } else {
            info!("Immediate prices sent to {}", chat);
        }
        Ok(())
    }

    fn channel(&self, chat: &Destination) -> Result<()> {
        info!("/channel command from chat_id: {}", chat);
        self.pipeline.delivery().notify(
            chat,
            &format!("🔄 Posting to {}...", self.broadcast),
            SendOptions::plain(),
        )?;

        self.pipeline.run(&self.broadcast, Some(chat))?;

        self.pipeline.delivery().notify(
            chat,
            &format!("✅ Successfully posted to {}!", self.broadcast),
            SendOptions::plain(),
        )?;
        info!("Posted to {} successfully", self.broadcast);
        Ok(())
    }

    fn welcome(&self, sender_name: &str) -> String {
        let mut message = format!(
            "👋 Hello {}!\n\n\
             🤖 **Crypto Price Bot** is now active!\n\n\
             📊 You'll receive top 5 crypto prices every {}\n\
             🔄 First update in {} seconds...\n\n\
             **Commands:**\n\
             • /start - Start updates\n\
             • /stop - Stop updates\n\
             • /prices - Get prices now\n\
             • /channel - Post to {}",
            sender_name,
            describe_period(self.schedule.period),
            self.schedule.first_run.unwrap_or_default().as_secs(),
            self.broadcast
        );
        if let Some(promoted) = &self.promoted_channel {
            message.push_str(&format!(
                "\n\n💎 Join {} for exclusive airdrops and crypto signals!",
                promoted
            ));
        }
        message
    }

    fn failure_reply(&self, kind: CommandKind) -> String {
        match kind {
            CommandKind::Start => String::from("❌ Error starting bot. Please try again."),
            CommandKind::Stop => String::from("❌ Error stopping updates."),
            CommandKind::Prices => String::from("❌ Error fetching prices."),
            CommandKind::Channel => format!(
                "❌ Error posting to {}. Make sure the bot is an admin in the channel.",
                self.broadcast
            ),
        }
    }
}

fn describe_period(period: Duration) -> String {
    let secs = period.as_secs();
    match secs {
        60 => String::from("minute"),
        s if s % 60 == 0 => format!("{} minutes", s / 60),
        s => format!("{} seconds", s),
    }
}
