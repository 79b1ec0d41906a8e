//! Routes inbound events to capability adapters and queues the replies.

use crate::channels::{Channel, InboundEvent, InboundKind, Payload};
use crate::delivery::DeliveryQueue;
use crate::providers::ContentProvider;
use crate::session::SessionStore;
use crate::util::truncate_with_ellipsis;
use std::sync::Arc;

pub const IMAGE_RECEIVED: &str =
    "Image received! Now, you can use the \"/gemini\" command with any prompt to analyze the image.";
pub const NO_IMAGE: &str = "No image found. Please send an image first.";
pub const GEMINI_USAGE: &str =
    "Please provide a prompt after the /gemini command. Example: /gemini Describe this image";
pub const VISION_EMPTY: &str =
    "Sorry, I couldn't retrieve information for this image. Please try again later.";
pub const VISION_FAILED: &str =
    "⛔ There was an error processing your image analysis request. Please try again later.";
pub const PLAY_USAGE: &str =
    "Please provide a song name or query to search for on Spotify.\n\nExample: Pantropiko";
pub const SONG_NOT_FOUND: &str = "Sorry, no Spotify link found for that query.";
pub const SONG_FAILED: &str = "⛔ Sorry, there was an error processing your request.";
pub const IMAGINE_USAGE: &str = "Please provide a prompt for the image generation.";
pub const IMAGINE_FAILED: &str =
    "⛔ There was an error processing your image generation request. Please try again later.";
pub const ASK_FAILED: &str = "Sorry, I couldn't process your request. Please try again later.";

const GEMINI_PREFIX: &str = "/gemini";
const PLAY_PREFIX: &str = "/play";
const IMAGINE_PREFIX: &str = "/imagine";

/// A text message classified by its (case-sensitive) command prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/gemini <prompt>`: ask about the sender's last image.
    AnalyzeImage { prompt: String },
    /// `/play <query>`: look up a song.
    PlaySong { query: String },
    /// `/imagine <prompt>`: generate an image.
    Imagine { prompt: String },
    /// Anything else goes to text Q&A.
    Ask(String),
}

impl Command {
    pub fn parse(text: &str) -> Self {
        if let Some(rest) = text.strip_prefix(GEMINI_PREFIX) {
            return Self::AnalyzeImage {
                prompt: rest.trim().to_string(),
            };
        }
        if text.starts_with(PLAY_PREFIX) {
            // Arguments are the words after the first one, so `/play` glued to
            // other text ("/playlist") does not leak into the query.
            let query = text.split_whitespace().skip(1).collect::<Vec<_>>().join(" ");
            return Self::PlaySong { query };
        }
        if let Some(rest) = text.strip_prefix(IMAGINE_PREFIX) {
            return Self::Imagine {
                prompt: rest.trim().to_string(),
            };
        }
        Self::Ask(text.to_string())
    }

    fn label(&self) -> &'static str {
        match self {
            Self::AnalyzeImage { .. } => "gemini",
            Self::PlaySong { .. } => "play",
            Self::Imagine { .. } => "imagine",
            Self::Ask(_) => "ask",
        }
    }
}

/// Handles one inbound event end to end. Failures never escape: they are
/// logged and turned into a reply for the sender.
#[derive(Clone)]
pub struct Dispatcher {
    provider: Arc<dyn ContentProvider>,
    sessions: Arc<dyn SessionStore>,
    channel: Arc<dyn Channel>,
    replies: DeliveryQueue,
}

impl Dispatcher {
    pub fn new(
        provider: Arc<dyn ContentProvider>,
        sessions: Arc<dyn SessionStore>,
        channel: Arc<dyn Channel>,
        replies: DeliveryQueue,
    ) -> Self {
        Self {
            provider,
            sessions,
            channel,
            replies,
        }
    }

    pub async fn handle(&self, event: InboundEvent) {
        let InboundEvent { sender, kind } = event;
        match kind {
            InboundKind::Image { url } => {
                tracing::info!(sender = %sender, "image received");
                self.sessions.set(&sender, &url);
                self.replies.send_text(&sender, IMAGE_RECEIVED);
            }
            InboundKind::Text(text) => {
                let command = Command::parse(&text);
                tracing::info!(
                    sender = %sender,
                    command = command.label(),
                    "message: {}",
                    truncate_with_ellipsis(&text, 50)
                );
                // Read receipt runs alongside the command, not before it.
                let mark_seen = async {
                    if let Err(err) = self.channel.mark_seen(&sender).await {
                        tracing::warn!(sender = %sender, "mark_seen failed: {err:#}");
                    }
                };
                tokio::join!(mark_seen, self.run(&sender, command));
            }
        }
    }

    async fn run(&self, sender: &str, command: Command) {
        match command {
            Command::AnalyzeImage { prompt } => self.analyze_image(sender, &prompt).await,
            Command::PlaySong { query } => self.play_song(sender, &query).await,
            Command::Imagine { prompt } => self.imagine(sender, &prompt).await,
            Command::Ask(query) => self.ask(sender, &query).await,
        }
    }

    async fn analyze_image(&self, sender: &str, prompt: &str) {
        let Some(image_url) = self.sessions.get(sender) else {
            self.replies.send_text(sender, NO_IMAGE);
            return;
        };
        if prompt.is_empty() {
            self.replies.send_text(sender, GEMINI_USAGE);
            return;
        }

        match self.provider.analyze_image(sender, prompt, &image_url).await {
            Ok(Some(answer)) => self.replies.send_text(sender, &answer),
            Ok(None) => self.replies.send_text(sender, VISION_EMPTY),
            Err(err) => {
                tracing::warn!(sender, "vision analysis failed: {err}");
                self.replies.send_text(sender, VISION_FAILED);
            }
        }
    }

    async fn play_song(&self, sender: &str, query: &str) {
        if query.is_empty() {
            self.replies.send_text(sender, PLAY_USAGE);
            return;
        }

        match self.provider.search_song(query).await {
            Ok(Some(link)) => self.replies.send_payload(sender, Payload::audio(link)),
            Ok(None) => self.replies.send_text(sender, SONG_NOT_FOUND),
            Err(err) => {
                tracing::warn!(sender, "song search failed: {err}");
                self.replies.send_text(sender, SONG_FAILED);
            }
        }
    }

    async fn imagine(&self, sender: &str, prompt: &str) {
        if prompt.is_empty() {
            self.replies.send_text(sender, IMAGINE_USAGE);
            return;
        }

        match self.provider.generate_image(prompt).await {
            Ok(url) => self.replies.send_payload(sender, Payload::image(url)),
            Err(err) => {
                tracing::warn!(sender, "image generation failed: {err}");
                self.replies.send_text(sender, IMAGINE_FAILED);
            }
        }
    }

    async fn ask(&self, sender: &str, query: &str) {
        match self.provider.ask(sender, query).await {
            Ok(answer) => self.replies.send_text(sender, &answer),
            Err(err) => {
                tracing::warn!(sender, "text Q&A failed: {err}");
                self.replies.send_text(sender, ASK_FAILED);
            }
        }
    }
}
