//! Conversation orchestration.
//!
//! `ConversationUseCase` composes the context store, session limiter,
//! replacement reconciler and HTTP endpoints into complete chat and
//! image turns. It is invoked from the host's event path only; the
//! single in-flight flag is the whole concurrency story. A submission
//! while a request is outstanding is rejected, never queued.

use redline_core::context::ContextFragment;
use redline_core::document::{DocumentAccessor, Heading, collect_section_text};
use redline_core::limits::CounterKind;
use redline_core::replace::{ReplacementReconciler, ReplacementReport};
use redline_core::session::{ChatMode, EngineEvent, NoticeSeverity, Session};
use redline_interaction::{
    ChatEndpoint, ChatTurnRequest, ImageEndpoint, ImageGenerationRequest, TransportError,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{RwLock, mpsc};

/// Title sent when the editor reports none.
pub const DEFAULT_DOCUMENT_TITLE: &str = "RFP Document";

/// Dimensions for generated images inserted into the document.
const IMAGE_WIDTH: u32 = 400;
const IMAGE_HEIGHT: u32 = 300;

/// Typed result of one submission, for programmatic callers. The host
/// UI normally follows the event stream instead.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// A chat reply arrived and was rendered.
    Reply {
        bot_response: String,
        /// Present when the response carried a replacement map.
        replacements: Option<ReplacementReport>,
    },
    /// An image was generated (and insertion attempted).
    ImageGenerated {
        inserted: bool,
        /// True when the call modified the previous image instead of
        /// consuming a budget slot.
        modified_existing: bool,
    },
    /// Blank input; nothing was submitted.
    EmptyInput,
    /// The counter for the active mode is exhausted; no network call
    /// was made.
    LimitReached,
    /// Another request is still in flight.
    Busy,
    /// The endpoint call failed; local state is untouched.
    TransportFailed(TransportError),
}

/// Releases the in-flight flag on every exit path.
struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
            .then_some(Self { flag })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Orchestrates chat and image turns for one session.
pub struct ConversationUseCase {
    /// All mutable conversation state.
    session: RwLock<Session>,
    /// Host-provided document capabilities.
    accessor: Arc<dyn DocumentAccessor>,
    /// Remote chat endpoint.
    chat_endpoint: Arc<dyn ChatEndpoint>,
    /// Remote image-generation endpoint.
    image_endpoint: Arc<dyn ImageEndpoint>,
    /// Applies replacement directives from chat replies.
    reconciler: ReplacementReconciler,
    /// Event stream consumed by the host UI.
    events: mpsc::UnboundedSender<EngineEvent>,
    /// Sole concurrency guard for the submission path.
    in_flight: AtomicBool,
    /// Document title, fetched once and cached.
    document_title: RwLock<Option<String>>,
}

impl ConversationUseCase {
    pub fn new(
        accessor: Arc<dyn DocumentAccessor>,
        chat_endpoint: Arc<dyn ChatEndpoint>,
        image_endpoint: Arc<dyn ImageEndpoint>,
        events: mpsc::UnboundedSender<EngineEvent>,
    ) -> Self {
        Self {
            session: RwLock::new(Session::new()),
            accessor,
            chat_endpoint,
            image_endpoint,
            reconciler: ReplacementReconciler::new(),
            events,
            in_flight: AtomicBool::new(false),
            document_title: RwLock::new(None),
        }
    }

    /// Replaces the reconciler, e.g. to enable the fuzzy fallback.
    pub fn with_reconciler(mut self, reconciler: ReplacementReconciler) -> Self {
        self.reconciler = reconciler;
        self
    }

    // ------------------------------------------------------------------
    // Submission
    // ------------------------------------------------------------------

    /// Routes the input to a chat or image turn based on the active mode.
    pub async fn submit(&self, input: &str) -> TurnOutcome {
        match self.mode().await {
            ChatMode::Chat => self.send_chat_turn(input).await,
            ChatMode::Image => self.send_image_turn(input).await,
        }
    }

    /// Runs one chat turn: payload, dispatch, reply rendering,
    /// replacement reconciliation, counter and context bookkeeping.
    pub async fn send_chat_turn(&self, question: &str) -> TurnOutcome {
        let question = question.trim();
        if question.is_empty() {
            self.notify(NoticeSeverity::Info, "Please enter a question.");
            return TurnOutcome::EmptyInput;
        }

        {
            let session = self.session.read().await;
            if session.messages.is_exhausted() {
                self.notify(
                    NoticeSeverity::Warning,
                    format!(
                        "Maximum message limit reached ({} messages). Restart the session to continue.",
                        session.messages.ceiling()
                    ),
                );
                return TurnOutcome::LimitReached;
            }
        }

        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            tracing::debug!(target: "conversation", "chat submission rejected, request in flight");
            return TurnOutcome::Busy;
        };

        self.emit(EngineEvent::user(question));

        let rfp_title = self.document_title().await;
        let request = {
            let session = self.session.read().await;
            let context = (!session.context.is_empty()).then(|| {
                session
                    .context
                    .snapshot()
                    .into_iter()
                    .map(|(key, text)| (key.to_string(), text.to_string()))
                    .collect::<BTreeMap<String, String>>()
            });
            ChatTurnRequest {
                rfp_title,
                question: question.to_string(),
                context,
            }
        };

        match self.chat_endpoint.send(&request).await {
            Ok(reply) => {
                self.emit(EngineEvent::bot(reply.bot_response.as_str()));

                let replacements = if reply.replacement_text.is_empty() {
                    None
                } else {
                    let report = self
                        .reconciler
                        .apply(self.accessor.as_ref(), &reply.replacement_text)
                        .await;
                    self.report_replacements(&report);
                    Some(report)
                };

                let mut session = self.session.write().await;
                match session.messages.increment() {
                    Ok(count) => self.emit(EngineEvent::CounterUpdated {
                        counter: CounterKind::Messages,
                        count,
                        ceiling: session.messages.ceiling(),
                    }),
                    Err(err) => {
                        tracing::warn!(target: "conversation", %err, "message counter rejected increment")
                    }
                }
                // A successful turn always drops the attached context so
                // it cannot bleed into the next question.
                session.context.clear();

                TurnOutcome::Reply {
                    bot_response: reply.bot_response,
                    replacements,
                }
            }
            Err(err) => {
                let text = match err {
                    TransportError::Timeout => "Request timed out - please try again.",
                    _ => "Server error occurred.",
                };
                self.notify(NoticeSeverity::Error, text);
                tracing::error!(target: "conversation", %err, "chat turn failed");
                TurnOutcome::TransportFailed(err)
            }
        }
    }

    /// Runs one image turn. Whether the call modifies the previous image
    /// is decided by the ids held *before* dispatch; only fresh
    /// generations consume a budget slot.
    pub async fn send_image_turn(&self, prompt: &str) -> TurnOutcome {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            self.notify(NoticeSeverity::Info, "Please enter an image description.");
            return TurnOutcome::EmptyInput;
        }

        let modifying = {
            let session = self.session.read().await;
            if session.image_generations.is_exhausted() {
                self.notify(
                    NoticeSeverity::Warning,
                    format!(
                        "Maximum image generation limit reached ({} images). Restart the session to continue.",
                        session.image_generations.ceiling()
                    ),
                );
                return TurnOutcome::LimitReached;
            }
            session.image_conversation.is_continuation()
        };

        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            tracing::debug!(target: "conversation", "image submission rejected, request in flight");
            return TurnOutcome::Busy;
        };

        self.emit(EngineEvent::user(prompt));

        let request = {
            let session = self.session.read().await;
            ImageGenerationRequest {
                prompt: prompt.to_string(),
                image_call_id: session
                    .image_conversation
                    .image_call_id()
                    .map(str::to_string),
                conversation_id: session
                    .image_conversation
                    .conversation_id()
                    .map(str::to_string),
            }
        };

        match self.image_endpoint.generate(&request).await {
            Ok(reply) => {
                {
                    let mut session = self.session.write().await;
                    session
                        .image_conversation
                        .record(reply.image_call_id.clone(), reply.conversation_id.clone());
                    if !modifying {
                        match session.image_generations.increment() {
                            Ok(count) => self.emit(EngineEvent::CounterUpdated {
                                counter: CounterKind::ImageGenerations,
                                count,
                                ceiling: session.image_generations.ceiling(),
                            }),
                            Err(err) => {
                                tracing::warn!(target: "conversation", %err, "image counter rejected increment")
                            }
                        }
                    }
                }

                self.emit(EngineEvent::bot(
                    reply
                        .message
                        .clone()
                        .unwrap_or_else(|| "Image generated successfully.".to_string()),
                ));

                let inserted = self
                    .accessor
                    .insert_image(&reply.image_base64, IMAGE_WIDTH, IMAGE_HEIGHT)
                    .await;
                if inserted {
                    self.notify(NoticeSeverity::Info, "Image inserted into the document.");
                } else {
                    self.notify(
                        NoticeSeverity::Warning,
                        "Could not insert the image into the document.",
                    );
                }

                TurnOutcome::ImageGenerated {
                    inserted,
                    modified_existing: modifying,
                }
            }
            Err(err) => {
                let text = match err {
                    TransportError::Timeout => "Image generation timed out - please try again.",
                    _ => "Image generation failed.",
                };
                self.notify(NoticeSeverity::Error, text);
                tracing::error!(target: "conversation", %err, "image turn failed");
                TurnOutcome::TransportFailed(err)
            }
        }
    }

    // ------------------------------------------------------------------
    // Context management
    // ------------------------------------------------------------------

    /// Attaches the current selection as a context fragment.
    ///
    /// Every failure (no selection, store full, budget) degrades to a
    /// notice; the caller gets `None`.
    pub async fn attach_selection(&self) -> Option<ContextFragment> {
        let text = self.accessor.selected_text().await;
        if text.trim().is_empty() {
            self.notify(NoticeSeverity::Info, "Please select some text first.");
            return None;
        }

        let result = {
            let mut session = self.session.write().await;
            session.context.attach(text, false, None)
        };

        match result {
            Ok(fragment) => {
                self.accessor.highlight_selection().await;
                Some(fragment)
            }
            Err(err) => {
                self.notify(
                    NoticeSeverity::Warning,
                    format!("Could not attach context: {err}."),
                );
                None
            }
        }
    }

    /// Attaches the section under `heading` as a header-derived context
    /// fragment and highlights the heading in the document.
    pub async fn attach_heading_section(&self, heading: &Heading) -> Option<ContextFragment> {
        let blocks = self.accessor.list_blocks().await;
        let content = collect_section_text(&blocks, heading);
        if content.trim().is_empty() {
            self.notify(
                NoticeSeverity::Info,
                "No content found under the selected heading.",
            );
            return None;
        }

        let result = {
            let mut session = self.session.write().await;
            session
                .context
                .attach(content, true, Some(heading.text.clone()))
        };

        match result {
            Ok(fragment) => {
                self.accessor.highlight_text(&heading.text).await;
                Some(fragment)
            }
            Err(err) => {
                self.notify(
                    NoticeSeverity::Warning,
                    format!("Could not attach context: {err}."),
                );
                None
            }
        }
    }

    /// Removes one context fragment by key. No-op for absent keys.
    pub async fn remove_context(&self, key: u8) {
        self.session.write().await.context.remove(key);
    }

    /// Drops all attached context.
    pub async fn clear_context(&self) {
        self.session.write().await.context.clear();
    }

    // ------------------------------------------------------------------
    // Mode and image conversation boundaries
    // ------------------------------------------------------------------

    /// Switches the interaction mode and announces it.
    pub async fn switch_mode(&self, mode: ChatMode) {
        {
            let mut session = self.session.write().await;
            session.switch_mode(mode);
        }
        self.emit(EngineEvent::ModeChanged { mode });

        let welcome = match mode {
            ChatMode::Chat => {
                "Chat mode. Ask about the document or attach selected text as context.".to_string()
            }
            ChatMode::Image => {
                let ceiling = self.session.read().await.image_generations.ceiling();
                format!("Image generator mode. You can generate up to {ceiling} images per session.")
            }
        };
        self.notify(NoticeSeverity::Info, welcome);
    }

    /// Ends the current image conversation. The next generation starts
    /// an independent image and consumes a fresh budget slot; counters
    /// stay monotone and are only reset by an external session restart.
    pub async fn reset_image_conversation(&self) {
        self.session.write().await.image_conversation.clear();
        self.notify(
            NoticeSeverity::Info,
            "Image conversation reset. The next prompt starts a new image.",
        );
    }

    // ------------------------------------------------------------------
    // State accessors
    // ------------------------------------------------------------------

    /// The document title used in outbound payloads, fetched once.
    /// Blank titles fall back to [`DEFAULT_DOCUMENT_TITLE`]; a
    /// `.docx`/`.doc` extension is stripped.
    pub async fn document_title(&self) -> String {
        if let Some(title) = self.document_title.read().await.clone() {
            return title;
        }
        let raw = self.accessor.document_title().await;
        let title = normalize_document_title(&raw);
        *self.document_title.write().await = Some(title.clone());
        title
    }

    pub async fn mode(&self) -> ChatMode {
        self.session.read().await.mode
    }

    pub async fn message_count(&self) -> u32 {
        self.session.read().await.messages.count()
    }

    pub async fn image_generation_count(&self) -> u32 {
        self.session.read().await.image_generations.count()
    }

    pub async fn context_fragments(&self) -> Vec<ContextFragment> {
        self.session.read().await.context.fragments().to_vec()
    }

    pub async fn context_total_chars(&self) -> usize {
        self.session.read().await.context.total_chars()
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn report_replacements(&self, report: &ReplacementReport) {
        if report.applied > 0 {
            self.notify(
                NoticeSeverity::Info,
                format!(
                    "{} text replacement(s) applied to the document.",
                    report.applied
                ),
            );
        }
        if report.failed > 0 {
            self.notify(
                NoticeSeverity::Warning,
                format!(
                    "{} replacement(s) failed because their text was not found in the document.",
                    report.failed
                ),
            );
        }
    }

    fn notify(&self, severity: NoticeSeverity, content: impl Into<String>) {
        self.emit(EngineEvent::notice(severity, content));
    }

    fn emit(&self, event: EngineEvent) {
        // The receiver may be gone during host shutdown; dropped events
        // are acceptable there.
        let _ = self.events.send(event);
    }
}

fn normalize_document_title(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "Untitled Document" {
        return DEFAULT_DOCUMENT_TITLE.to_string();
    }
    for ext in [".docx", ".doc"] {
        if trimmed.len() > ext.len() {
            if let Some(suffix) = trimmed.get(trimmed.len() - ext.len()..) {
                if suffix.eq_ignore_ascii_case(ext) {
                    return trimmed[..trimmed.len() - ext.len()].to_string();
                }
            }
        }
    }
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use redline_core::document::DocumentBlock;
    use redline_core::replace::ReplacementDirective;
    use redline_interaction::{ChatTurnReply, ImageGenerationReply};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::sync::Notify;

    #[derive(Default)]
    struct MockDocument {
        title: String,
        selected: String,
        blocks: Vec<DocumentBlock>,
        insert_ok: bool,
        replace_calls: Mutex<Vec<(String, String)>>,
        highlighted_selections: Mutex<usize>,
        highlighted_texts: Mutex<Vec<String>>,
        inserted_images: Mutex<Vec<(String, u32, u32)>>,
    }

    #[async_trait]
    impl DocumentAccessor for MockDocument {
        async fn document_title(&self) -> String {
            self.title.clone()
        }

        async fn selected_text(&self) -> String {
            self.selected.clone()
        }

        async fn list_headings(&self) -> Vec<Heading> {
            Vec::new()
        }

        async fn list_blocks(&self) -> Vec<DocumentBlock> {
            self.blocks.clone()
        }

        async fn search_and_replace(&self, search: &str, replace: &str, _match_case: bool) {
            self.replace_calls
                .lock()
                .unwrap()
                .push((search.to_string(), replace.to_string()));
        }

        async fn highlight_text(&self, search: &str) {
            self.highlighted_texts.lock().unwrap().push(search.to_string());
        }

        async fn highlight_selection(&self) {
            *self.highlighted_selections.lock().unwrap() += 1;
        }

        async fn insert_image(&self, base64_data: &str, width: u32, height: u32) -> bool {
            self.inserted_images
                .lock()
                .unwrap()
                .push((base64_data.to_string(), width, height));
            self.insert_ok
        }
    }

    #[derive(Default)]
    struct MockChat {
        replies: Mutex<VecDeque<Result<ChatTurnReply, TransportError>>>,
        requests: Mutex<Vec<ChatTurnRequest>>,
        gate: Option<Arc<Notify>>,
    }

    impl MockChat {
        fn with_replies(replies: Vec<Result<ChatTurnReply, TransportError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                ..Self::default()
            }
        }

        fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    fn plain_reply(text: &str) -> ChatTurnReply {
        ChatTurnReply {
            bot_response: text.to_string(),
            replacement_text: Default::default(),
        }
    }

    #[async_trait]
    impl ChatEndpoint for MockChat {
        async fn send(&self, request: &ChatTurnRequest) -> Result<ChatTurnReply, TransportError> {
            self.requests.lock().unwrap().push(request.clone());
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::ServerError("exhausted".to_string())))
        }
    }

    #[derive(Default)]
    struct MockImage {
        replies: Mutex<VecDeque<Result<ImageGenerationReply, TransportError>>>,
        requests: Mutex<Vec<ImageGenerationRequest>>,
    }

    impl MockImage {
        fn with_replies(replies: Vec<Result<ImageGenerationReply, TransportError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    fn image_reply(call_id: &str) -> ImageGenerationReply {
        ImageGenerationReply {
            image_base64: "aGVsbG8=".to_string(),
            image_call_id: Some(call_id.to_string()),
            conversation_id: Some("conv-1".to_string()),
            message: None,
        }
    }

    #[async_trait]
    impl ImageEndpoint for MockImage {
        async fn generate(
            &self,
            request: &ImageGenerationRequest,
        ) -> Result<ImageGenerationReply, TransportError> {
            self.requests.lock().unwrap().push(request.clone());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::ServerError("exhausted".to_string())))
        }
    }

    struct Harness {
        usecase: Arc<ConversationUseCase>,
        doc: Arc<MockDocument>,
        chat: Arc<MockChat>,
        image: Arc<MockImage>,
        events: mpsc::UnboundedReceiver<EngineEvent>,
    }

    impl Harness {
        fn new(doc: MockDocument, chat: MockChat, image: MockImage) -> Self {
            let (tx, rx) = mpsc::unbounded_channel();
            let doc = Arc::new(doc);
            let chat = Arc::new(chat);
            let image = Arc::new(image);
            let usecase = Arc::new(ConversationUseCase::new(
                doc.clone(),
                chat.clone(),
                image.clone(),
                tx,
            ));
            Self {
                usecase,
                doc,
                chat,
                image,
                events: rx,
            }
        }

        fn drain_events(&mut self) -> Vec<EngineEvent> {
            let mut events = Vec::new();
            while let Ok(event) = self.events.try_recv() {
                events.push(event);
            }
            events
        }
    }

    #[tokio::test]
    async fn chat_turn_renders_reply_and_advances_the_counter() {
        let mut h = Harness::new(
            MockDocument::default(),
            MockChat::with_replies(vec![Ok(plain_reply("Hello!"))]),
            MockImage::default(),
        );

        let outcome = h.usecase.send_chat_turn("What changed?").await;
        assert_eq!(
            outcome,
            TurnOutcome::Reply {
                bot_response: "Hello!".to_string(),
                replacements: None
            }
        );
        assert_eq!(h.usecase.message_count().await, 1);

        let events = h.drain_events();
        assert!(events.contains(&EngineEvent::user("What changed?")));
        assert!(events.contains(&EngineEvent::bot("Hello!")));
        assert!(events.iter().any(|e| matches!(
            e,
            EngineEvent::CounterUpdated {
                counter: CounterKind::Messages,
                count: 1,
                ..
            }
        )));
    }

    #[tokio::test]
    async fn chat_turn_sends_context_and_clears_it_afterwards() {
        let doc = MockDocument {
            selected: "Revenue grew in 2024.".to_string(),
            ..Default::default()
        };
        let h = Harness::new(
            doc,
            MockChat::with_replies(vec![Ok(plain_reply("ok")), Ok(plain_reply("ok"))]),
            MockImage::default(),
        );

        h.usecase.attach_selection().await.unwrap();
        h.usecase.send_chat_turn("Summarize.").await;

        {
            let requests = h.chat.requests.lock().unwrap();
            let context = requests[0].context.as_ref().unwrap();
            assert_eq!(context.get("1").unwrap(), "Revenue grew in 2024.");
        }

        // The successful turn dropped the context
        assert!(h.usecase.context_fragments().await.is_empty());
        h.usecase.send_chat_turn("Again.").await;
        assert!(h.chat.requests.lock().unwrap()[1].context.is_none());
    }

    #[tokio::test]
    async fn failed_turn_preserves_counter_and_context() {
        let doc = MockDocument {
            selected: "Some context".to_string(),
            ..Default::default()
        };
        let mut h = Harness::new(
            doc,
            MockChat::with_replies(vec![Err(TransportError::Timeout)]),
            MockImage::default(),
        );

        h.usecase.attach_selection().await.unwrap();
        let outcome = h.usecase.send_chat_turn("Hello?").await;

        assert_eq!(outcome, TurnOutcome::TransportFailed(TransportError::Timeout));
        assert_eq!(h.usecase.message_count().await, 0);
        assert_eq!(h.usecase.context_fragments().await.len(), 1);

        let events = h.drain_events();
        assert!(events.iter().any(|e| matches!(
            e,
            EngineEvent::Notice {
                severity: NoticeSeverity::Error,
                content
            } if content.contains("timed out")
        )));
    }

    #[tokio::test]
    async fn guard_is_released_after_a_failure() {
        let h = Harness::new(
            MockDocument::default(),
            MockChat::with_replies(vec![
                Err(TransportError::NetworkFailure("down".to_string())),
                Ok(plain_reply("recovered")),
            ]),
            MockImage::default(),
        );

        assert!(matches!(
            h.usecase.send_chat_turn("first").await,
            TurnOutcome::TransportFailed(_)
        ));
        assert!(matches!(
            h.usecase.send_chat_turn("second").await,
            TurnOutcome::Reply { .. }
        ));
    }

    #[tokio::test]
    async fn sixth_submission_is_rejected_before_any_network_call() {
        let replies = (0..5).map(|_| Ok(plain_reply("ok"))).collect();
        let h = Harness::new(
            MockDocument::default(),
            MockChat::with_replies(replies),
            MockImage::default(),
        );

        for i in 0..5 {
            let outcome = h.usecase.send_chat_turn(&format!("turn {i}")).await;
            assert!(matches!(outcome, TurnOutcome::Reply { .. }));
        }

        let outcome = h.usecase.send_chat_turn("one too many").await;
        assert_eq!(outcome, TurnOutcome::LimitReached);
        assert_eq!(h.chat.request_count(), 5);
    }

    #[tokio::test]
    async fn blank_input_is_not_submitted() {
        let h = Harness::new(
            MockDocument::default(),
            MockChat::default(),
            MockImage::default(),
        );

        assert_eq!(h.usecase.send_chat_turn("   ").await, TurnOutcome::EmptyInput);
        assert_eq!(h.chat.request_count(), 0);
    }

    #[tokio::test]
    async fn concurrent_submission_is_rejected_not_queued() {
        let gate = Arc::new(Notify::new());
        let chat = MockChat {
            replies: Mutex::new(vec![Ok(plain_reply("slow"))].into()),
            requests: Mutex::new(Vec::new()),
            gate: Some(gate.clone()),
        };
        let h = Harness::new(MockDocument::default(), chat, MockImage::default());

        let usecase = h.usecase.clone();
        let first = tokio::spawn(async move { usecase.send_chat_turn("first").await });

        // Let the first turn reach the endpoint and park on the gate
        while h.chat.request_count() == 0 {
            tokio::task::yield_now().await;
        }

        assert_eq!(h.usecase.send_chat_turn("second").await, TurnOutcome::Busy);

        gate.notify_one();
        assert!(matches!(first.await.unwrap(), TurnOutcome::Reply { .. }));
    }

    #[tokio::test]
    async fn replacements_from_the_reply_are_reconciled_and_reported() {
        let doc = MockDocument {
            blocks: vec![
                DocumentBlock::new("Revenue grew.", None),
                DocumentBlock::new("Costs fell.", None),
            ],
            ..Default::default()
        };
        let mut replacement_text = redline_core::replace::ReplacementMap::new();
        replacement_text.insert(
            "1".to_string(),
            vec![
                ReplacementDirective {
                    target_text: "Revenue".to_string(),
                    new_text: "Income".to_string(),
                },
                ReplacementDirective {
                    target_text: "Margin".to_string(),
                    new_text: "Spread".to_string(),
                },
            ],
        );
        let reply = ChatTurnReply {
            bot_response: "Updated.".to_string(),
            replacement_text,
        };
        let mut h = Harness::new(
            doc,
            MockChat::with_replies(vec![Ok(reply)]),
            MockImage::default(),
        );

        let outcome = h.usecase.send_chat_turn("apply").await;
        let TurnOutcome::Reply {
            replacements: Some(report),
            ..
        } = outcome
        else {
            panic!("expected a reply with a replacement report");
        };
        assert_eq!(report.applied, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(h.doc.replace_calls.lock().unwrap().len(), 1);

        let events = h.drain_events();
        assert!(events.iter().any(|e| matches!(
            e,
            EngineEvent::Notice { content, .. } if content.contains("1 text replacement(s) applied")
        )));
        assert!(events.iter().any(|e| matches!(
            e,
            EngineEvent::Notice { content, .. } if content.contains("1 replacement(s) failed")
        )));
    }

    #[tokio::test]
    async fn attach_selection_highlights_and_stores_the_fragment() {
        let doc = MockDocument {
            selected: "Selected passage".to_string(),
            ..Default::default()
        };
        let h = Harness::new(doc, MockChat::default(), MockImage::default());

        let fragment = h.usecase.attach_selection().await.unwrap();
        assert_eq!(fragment.key, 1);
        assert!(!fragment.is_header_derived);
        assert_eq!(*h.doc.highlighted_selections.lock().unwrap(), 1);
        assert_eq!(h.usecase.context_total_chars().await, 16);
    }

    #[tokio::test]
    async fn attach_selection_without_a_selection_notices() {
        let mut h = Harness::new(
            MockDocument::default(),
            MockChat::default(),
            MockImage::default(),
        );

        assert!(h.usecase.attach_selection().await.is_none());
        let events = h.drain_events();
        assert!(events.iter().any(|e| matches!(
            e,
            EngineEvent::Notice { content, .. } if content.contains("select some text")
        )));
    }

    #[tokio::test]
    async fn attach_errors_degrade_to_warnings() {
        let doc = MockDocument {
            selected: "x".repeat(31_000),
            ..Default::default()
        };
        let mut h = Harness::new(doc, MockChat::default(), MockImage::default());

        assert!(h.usecase.attach_selection().await.is_none());
        assert_eq!(h.usecase.context_total_chars().await, 0);
        let events = h.drain_events();
        assert!(events.iter().any(|e| matches!(
            e,
            EngineEvent::Notice {
                severity: NoticeSeverity::Warning,
                content
            } if content.contains("Could not attach context")
        )));
    }

    #[tokio::test]
    async fn attach_heading_section_collects_and_labels() {
        let doc = MockDocument {
            blocks: vec![
                DocumentBlock::new("Revenue", Some("Heading 1")),
                DocumentBlock::new("Revenue grew in 2024.", None),
                DocumentBlock::new("Costs", Some("Heading 1")),
            ],
            ..Default::default()
        };
        let h = Harness::new(doc, MockChat::default(), MockImage::default());

        let heading = Heading::new("Revenue", "Heading 1", 0);
        let fragment = h.usecase.attach_heading_section(&heading).await.unwrap();
        assert!(fragment.is_header_derived);
        assert_eq!(fragment.header_label.as_deref(), Some("Revenue"));
        assert_eq!(fragment.content, "Revenue\n\nRevenue grew in 2024.");
        assert_eq!(
            h.doc.highlighted_texts.lock().unwrap().as_slice(),
            ["Revenue"]
        );
    }

    #[tokio::test]
    async fn switch_mode_clears_context_and_announces() {
        let doc = MockDocument {
            selected: "context".to_string(),
            ..Default::default()
        };
        let mut h = Harness::new(doc, MockChat::default(), MockImage::default());

        h.usecase.attach_selection().await.unwrap();
        h.usecase.switch_mode(ChatMode::Image).await;

        assert_eq!(h.usecase.mode().await, ChatMode::Image);
        assert!(h.usecase.context_fragments().await.is_empty());
        let events = h.drain_events();
        assert!(events.contains(&EngineEvent::ModeChanged {
            mode: ChatMode::Image
        }));
    }

    #[tokio::test]
    async fn first_image_generation_consumes_a_budget_slot() {
        let h = Harness::new(
            MockDocument {
                insert_ok: true,
                ..Default::default()
            },
            MockChat::default(),
            MockImage::with_replies(vec![Ok(image_reply("call-1"))]),
        );
        h.usecase.switch_mode(ChatMode::Image).await;

        let outcome = h.usecase.submit("a lighthouse").await;
        assert_eq!(
            outcome,
            TurnOutcome::ImageGenerated {
                inserted: true,
                modified_existing: false
            }
        );
        assert_eq!(h.usecase.image_generation_count().await, 1);

        let inserted = h.doc.inserted_images.lock().unwrap();
        assert_eq!(inserted.as_slice(), [("aGVsbG8=".to_string(), 400, 300)]);
    }

    #[tokio::test]
    async fn modifying_the_previous_image_is_free() {
        let h = Harness::new(
            MockDocument {
                insert_ok: true,
                ..Default::default()
            },
            MockChat::default(),
            MockImage::with_replies(vec![Ok(image_reply("call-1")), Ok(image_reply("call-1"))]),
        );
        h.usecase.switch_mode(ChatMode::Image).await;

        h.usecase.submit("a lighthouse").await;
        let outcome = h.usecase.submit("make it night").await;

        assert_eq!(
            outcome,
            TurnOutcome::ImageGenerated {
                inserted: true,
                modified_existing: true
            }
        );
        assert_eq!(h.usecase.image_generation_count().await, 1);

        // The second request carried the held ids
        let requests = h.image.requests.lock().unwrap();
        assert_eq!(requests[0].image_call_id, None);
        assert_eq!(requests[1].image_call_id.as_deref(), Some("call-1"));
    }

    #[tokio::test]
    async fn reset_boundary_makes_the_next_image_count_again() {
        let h = Harness::new(
            MockDocument {
                insert_ok: true,
                ..Default::default()
            },
            MockChat::default(),
            MockImage::with_replies(vec![Ok(image_reply("call-1")), Ok(image_reply("call-2"))]),
        );
        h.usecase.switch_mode(ChatMode::Image).await;

        h.usecase.submit("a lighthouse").await;
        h.usecase.reset_image_conversation().await;
        let outcome = h.usecase.submit("a windmill").await;

        assert!(matches!(
            outcome,
            TurnOutcome::ImageGenerated {
                modified_existing: false,
                ..
            }
        ));
        assert_eq!(h.usecase.image_generation_count().await, 2);
        assert_eq!(
            h.image.requests.lock().unwrap()[1].image_call_id,
            None
        );
    }

    #[tokio::test]
    async fn third_fresh_image_is_rejected_before_any_network_call() {
        let h = Harness::new(
            MockDocument {
                insert_ok: true,
                ..Default::default()
            },
            MockChat::default(),
            MockImage::with_replies(vec![Ok(image_reply("call-1")), Ok(image_reply("call-2"))]),
        );
        h.usecase.switch_mode(ChatMode::Image).await;

        h.usecase.submit("first").await;
        h.usecase.reset_image_conversation().await;
        h.usecase.submit("second").await;
        h.usecase.reset_image_conversation().await;

        assert_eq!(h.usecase.submit("third").await, TurnOutcome::LimitReached);
        assert_eq!(h.image.request_count(), 2);
    }

    #[tokio::test]
    async fn failed_image_turn_leaves_state_untouched() {
        let h = Harness::new(
            MockDocument::default(),
            MockChat::default(),
            MockImage::with_replies(vec![Err(TransportError::Timeout)]),
        );
        h.usecase.switch_mode(ChatMode::Image).await;

        let outcome = h.usecase.submit("a lighthouse").await;
        assert_eq!(outcome, TurnOutcome::TransportFailed(TransportError::Timeout));
        assert_eq!(h.usecase.image_generation_count().await, 0);
        assert!(h.doc.inserted_images.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn document_title_falls_back_and_strips_extensions() {
        let h = Harness::new(
            MockDocument {
                title: "Annual Report.docx".to_string(),
                ..Default::default()
            },
            MockChat::default(),
            MockImage::default(),
        );
        assert_eq!(h.usecase.document_title().await, "Annual Report");

        let blank = Harness::new(
            MockDocument::default(),
            MockChat::default(),
            MockImage::default(),
        );
        assert_eq!(blank.usecase.document_title().await, DEFAULT_DOCUMENT_TITLE);
    }

    #[test]
    fn title_normalization_rules() {
        assert_eq!(normalize_document_title("  "), DEFAULT_DOCUMENT_TITLE);
        assert_eq!(
            normalize_document_title("Untitled Document"),
            DEFAULT_DOCUMENT_TITLE
        );
        assert_eq!(normalize_document_title("Plan.DOC"), "Plan");
        assert_eq!(normalize_document_title("Notes"), "Notes");
    }
}
