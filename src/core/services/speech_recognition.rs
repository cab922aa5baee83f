use crate::{
    bot::transport::Transport,
    core::{
        config::json::QuotaSettings,
        services::{
            admission::{Decision, Denial, RemainingTime, Tier, check_admission, check_duration, remaining_time},
            ledger::{LedgerError, QuotaLedger},
            transcription::Transcriber,
        },
    },
    errors::MyError,
    util::{
        enums::{AudioEvent, AudioKind},
        split_text,
    },
};
use log::{debug, error, info, warn};

pub const DECODE_NOTICE: &str =
    "Decoding will take from 15% to 30% of file duration if it is not too short";
pub const DECODE_FAILED: &str = "There was an error decoding the file";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Rejected(Denial),
    DecodeFailed,
    /// `chunks` counts the transcript chunks that reached the chat.
    /// `remaining` is `None` when recording the usage failed.
    Delivered {
        chunks: usize,
        remaining: Option<RemainingTime>,
    },
}

/// Runs one audio or voice message through admission, decoding, delivery and
/// usage recording.
pub struct SpeechRecognition<'a> {
    pub transport: &'a dyn Transport,
    pub transcriber: &'a dyn Transcriber,
    pub ledger: &'a QuotaLedger,
    pub settings: &'a QuotaSettings,
}

impl SpeechRecognition<'_> {
    pub async fn handle(&self, event: &AudioEvent) -> Result<Outcome, MyError> {
        let tier = if self.transport.is_premium(event.user_id, event.chat_id).await {
            Tier::Premium
        } else {
            Tier::Free
        };

        if let Err(denial) = self.admit(event, tier).await {
            info!("Rejected {}s from user {}: {:?}", event.duration, event.user_id, denial);
            self.transport
                .send_message(event.chat_id, &denial.to_string())
                .await?;
            return Ok(Outcome::Rejected(denial));
        }

        self.transport.send_message(event.chat_id, DECODE_NOTICE).await?;

        let text = match tokio::time::timeout(
            self.settings.decode_timeout(),
            self.transcriber.decode(&event.file),
        )
        .await
        {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                error!("Failed to decode file {}: {:?}", event.file.file_id, e);
                self.transport.send_message(event.chat_id, DECODE_FAILED).await?;
                return Ok(Outcome::DecodeFailed);
            }
            Err(_) => {
                error!(
                    "Decoding file {} timed out after {:?}",
                    event.file.file_id,
                    self.settings.decode_timeout()
                );
                self.transport.send_message(event.chat_id, DECODE_FAILED).await?;
                return Ok(Outcome::DecodeFailed);
            }
        };

        let chunks = split_text(&text, self.settings.max_message_length);
        let header = match event.kind {
            AudioKind::Audio => "Here is the script of the audio:",
            AudioKind::Voice => "Here is the script of the voice message:",
        };
        let delivered = self.deliver(event, header, &chunks).await;

        // A decoded file is charged even when delivery broke off.
        let remaining = self.record(event, tier).await;
        if let Some(remaining) = remaining {
            self.transport
                .send_message(event.chat_id, &format!("Remaining free time: {remaining}"))
                .await?;
        }

        Ok(Outcome::Delivered {
            chunks: delivered,
            remaining,
        })
    }

    /// Sends the header and chunks in order, stopping at the first failed send.
    /// Returns how many chunks reached the chat.
    async fn deliver(&self, event: &AudioEvent, header: &str, chunks: &[String]) -> usize {
        if let Err(e) = self.transport.send_message(event.chat_id, header).await {
            error!("Failed to send transcript header to chat {}: {:?}", event.chat_id, e);
            return 0;
        }

        for (sent, chunk) in chunks.iter().enumerate() {
            if let Err(e) = self.transport.send_message(event.chat_id, chunk).await {
                error!(
                    "Failed to send chunk {} of {} to chat {}: {:?}",
                    sent + 1,
                    chunks.len(),
                    event.chat_id,
                    e
                );
                return sent;
            }
        }

        chunks.len()
    }

    async fn admit(&self, event: &AudioEvent, tier: Tier) -> Result<(), Denial> {
        let caps = self.settings.caps();
        if let Some(denial) = check_duration(event.duration, tier, &caps) {
            return Err(denial);
        }
        if tier == Tier::Premium {
            return Ok(());
        }

        let consumed = match self.ledger.get_consumed(event.user_id, tier).await {
            Ok(consumed) => consumed,
            Err(LedgerError::PeriodCapPermanentlyExceeded) => {
                return Err(Denial::Blocked {
                    first_name: event.first_name.clone(),
                });
            }
            Err(err) => {
                match &err {
                    LedgerError::UserNotFound => {
                        debug!("First request from user {}", event.user_id)
                    }
                    _ => error!("Failed to read usage of user {}: {}", event.user_id, err),
                }
                if let Err(e) = self.ledger.initialize_user(event.user_id, tier).await {
                    error!("Failed to initialize usage of user {}: {}", event.user_id, e);
                    return Err(Denial::Unavailable);
                }
                0
            }
        };

        match check_admission(event.duration, tier, consumed, &caps) {
            Decision::Grant => {
                debug!(
                    "Granted {}s to user {} ({} consumed)",
                    event.duration, event.user_id, consumed
                );
                Ok(())
            }
            Decision::Deny(denial) => Err(denial),
        }
    }

    async fn record(&self, event: &AudioEvent, tier: Tier) -> Option<RemainingTime> {
        let total = match self
            .ledger
            .increment_consumed(event.user_id, tier, event.duration)
            .await
        {
            Ok(total) => total,
            Err(e) => {
                error!("Failed to record {}s for user {}: {}", event.duration, event.user_id, e);
                return None;
            }
        };

        let caps = self.settings.caps();
        let cap = i64::from(caps.cap(tier));
        if total > cap {
            warn!(
                "User {} is over the {} cap: {}s of {}s",
                event.user_id, tier, total, cap
            );
        }

        Some(remaining_time(tier, total, &caps))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::{CounterStore, StoreError, memory::MemoryCounterStore};
    use crate::core::services::ledger::QuotaPeriod;
    use crate::util::enums::AudioStruct;
    use async_trait::async_trait;
    use std::sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    };
    use std::time::Duration;

    const USER: u64 = 42;
    const CHAT: i64 = 42;
    const UNAVAILABLE: &str = "There is an error occurred, please try again later";

    struct FakeTransport {
        premium: bool,
        /// 1-based index of the send that fails.
        fail_on: Option<usize>,
        attempts: AtomicUsize,
        sent: Mutex<Vec<String>>,
    }

    impl FakeTransport {
        fn new(premium: bool) -> Self {
            Self {
                premium,
                fail_on: None,
                attempts: AtomicUsize::new(0),
                sent: Mutex::new(Vec::new()),
            }
        }

        fn failing_on(send: usize) -> Self {
            Self {
                fail_on: Some(send),
                ..Self::new(false)
            }
        }

        fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn is_premium(&self, _user_id: u64, _chat_id: i64) -> bool {
            self.premium
        }

        async fn send_message(&self, _chat_id: i64, text: &str) -> Result<(), MyError> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_on == Some(attempt) {
                return Err(MyError::Io(std::io::Error::other("message is too long")));
            }
            self.sent.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    enum Reply {
        Text(String),
        Fail,
        Hang,
    }

    struct FakeTranscriber {
        reply: Reply,
        calls: AtomicUsize,
    }

    impl FakeTranscriber {
        fn new(reply: Reply) -> Self {
            Self {
                reply,
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transcriber for FakeTranscriber {
        async fn decode(&self, _file: &AudioStruct) -> Result<String, MyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.reply {
                Reply::Text(text) => Ok(text.clone()),
                Reply::Fail => Err(MyError::DecodeFailed("backend returned 500".to_string())),
                Reply::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(String::new())
                }
            }
        }
    }

    /// Memory store with switchable failures.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryCounterStore,
        fail_reads: bool,
        fail_create: bool,
        fail_incr: bool,
    }

    fn down() -> StoreError {
        StoreError::Unavailable("connection refused".to_string())
    }

    #[async_trait]
    impl CounterStore for FlakyStore {
        async fn get(&self, key: &str) -> Result<Option<i64>, StoreError> {
            if self.fail_reads {
                return Err(down());
            }
            self.inner.get(key).await
        }

        async fn create_if_absent(&self, key: &str) -> Result<bool, StoreError> {
            if self.fail_create {
                return Err(down());
            }
            self.inner.create_if_absent(key).await
        }

        async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, StoreError> {
            if self.fail_incr {
                return Err(down());
            }
            self.inner.incr_by(key, delta).await
        }

        async fn exists(&self, key: &str) -> Result<bool, StoreError> {
            if self.fail_reads {
                return Err(down());
            }
            self.inner.exists(key).await
        }

        async fn mark(&self, key: &str) -> Result<(), StoreError> {
            self.inner.mark(key).await
        }
    }

    fn event(duration: u32, kind: AudioKind) -> AudioEvent {
        AudioEvent {
            user_id: USER,
            chat_id: CHAT,
            first_name: "Sam".to_string(),
            duration,
            kind,
            file: AudioStruct {
                mime_type: "audio/ogg".to_string(),
                file_id: "file-1".to_string(),
                file_unique_id: "unique-1".to_string(),
            },
        }
    }

    fn memory_ledger() -> QuotaLedger {
        QuotaLedger::new(Arc::new(MemoryCounterStore::default()), QuotaPeriod::Lifetime)
    }

    fn flaky_ledger(store: FlakyStore) -> QuotaLedger {
        QuotaLedger::new(Arc::new(store), QuotaPeriod::Lifetime)
    }

    async fn ledger_with(tier: Tier, consumed: u32) -> QuotaLedger {
        let ledger = memory_ledger();
        ledger.initialize_user(USER, tier).await.unwrap();
        ledger.increment_consumed(USER, tier, consumed).await.unwrap();
        ledger
    }

    async fn try_run(
        transport: &FakeTransport,
        transcriber: &FakeTranscriber,
        ledger: &QuotaLedger,
        event: &AudioEvent,
    ) -> Result<Outcome, MyError> {
        let settings = QuotaSettings::default();
        SpeechRecognition {
            transport,
            transcriber,
            ledger,
            settings: &settings,
        }
        .handle(event)
        .await
    }

    async fn run(
        transport: &FakeTransport,
        transcriber: &FakeTranscriber,
        ledger: &QuotaLedger,
        event: &AudioEvent,
    ) -> Outcome {
        try_run(transport, transcriber, ledger, event).await.unwrap()
    }

    #[tokio::test]
    async fn insufficient_free_time_is_rejected_without_decoding() {
        let transport = FakeTransport::new(false);
        let transcriber = FakeTranscriber::new(Reply::Text("hello".to_string()));
        let ledger = ledger_with(Tier::Free, 250).await;

        let outcome = run(&transport, &transcriber, &ledger, &event(60, AudioKind::Audio)).await;

        assert!(matches!(outcome, Outcome::Rejected(Denial::QuotaExhausted { .. })));
        assert_eq!(
            transport.sent(),
            vec!["Too long audio, you dont have enough free time, remaining time: 00 minutes 50 seconds"]
        );
        assert_eq!(transcriber.calls(), 0);
        assert_eq!(ledger.get_consumed(USER, Tier::Free).await.unwrap(), 250);
    }

    #[tokio::test]
    async fn request_filling_the_cap_exactly_is_granted() {
        let transport = FakeTransport::new(false);
        let transcriber = FakeTranscriber::new(Reply::Text("to the brim".to_string()));
        let ledger = ledger_with(Tier::Free, 250).await;

        let outcome = run(&transport, &transcriber, &ledger, &event(50, AudioKind::Voice)).await;

        assert_eq!(
            outcome,
            Outcome::Delivered {
                chunks: 1,
                remaining: Some(RemainingTime::default())
            }
        );
        assert_eq!(ledger.get_consumed(USER, Tier::Free).await.unwrap(), 300);
    }

    #[tokio::test]
    async fn granted_request_is_delivered_and_recorded() {
        let transport = FakeTransport::new(false);
        let transcriber = FakeTranscriber::new(Reply::Text("hello there".to_string()));
        let ledger = ledger_with(Tier::Free, 250).await;

        let outcome = run(&transport, &transcriber, &ledger, &event(30, AudioKind::Voice)).await;

        assert_eq!(
            outcome,
            Outcome::Delivered {
                chunks: 1,
                remaining: Some(RemainingTime::from_seconds(20))
            }
        );
        assert_eq!(ledger.get_consumed(USER, Tier::Free).await.unwrap(), 280);
        assert_eq!(
            transport.sent(),
            vec![
                DECODE_NOTICE,
                "Here is the script of the voice message:",
                "hello there",
                "Remaining free time: 00 minutes 20 seconds",
            ]
        );
    }

    #[tokio::test]
    async fn premium_over_cap_is_granted_and_display_clamped() {
        let transport = FakeTransport::new(true);
        let transcriber = FakeTranscriber::new(Reply::Text("premium words".to_string()));
        let ledger = ledger_with(Tier::Premium, 3590).await;

        let outcome = run(&transport, &transcriber, &ledger, &event(40, AudioKind::Audio)).await;

        assert_eq!(
            outcome,
            Outcome::Delivered {
                chunks: 1,
                remaining: Some(RemainingTime::default())
            }
        );
        assert_eq!(ledger.get_consumed(USER, Tier::Premium).await.unwrap(), 3630);
        assert_eq!(
            transport.sent().last().unwrap(),
            "Remaining free time: 00 minutes 00 seconds"
        );
    }

    #[tokio::test]
    async fn premium_usage_does_not_touch_free_counter() {
        let transport = FakeTransport::new(true);
        let transcriber = FakeTranscriber::new(Reply::Text("x".to_string()));
        let ledger = ledger_with(Tier::Free, 100).await;

        run(&transport, &transcriber, &ledger, &event(600, AudioKind::Audio)).await;

        assert_eq!(ledger.get_consumed(USER, Tier::Free).await.unwrap(), 100);
        assert_eq!(ledger.get_consumed(USER, Tier::Premium).await.unwrap(), 600);
    }

    #[tokio::test]
    async fn decode_failure_leaves_ledger_untouched() {
        let transport = FakeTransport::new(false);
        let transcriber = FakeTranscriber::new(Reply::Fail);
        let ledger = ledger_with(Tier::Free, 100).await;

        let outcome = run(&transport, &transcriber, &ledger, &event(60, AudioKind::Voice)).await;

        assert_eq!(outcome, Outcome::DecodeFailed);
        assert_eq!(transport.sent(), vec![DECODE_NOTICE, DECODE_FAILED]);
        assert_eq!(ledger.get_consumed(USER, Tier::Free).await.unwrap(), 100);
    }

    #[tokio::test(start_paused = true)]
    async fn decode_timeout_counts_as_failure() {
        let transport = FakeTransport::new(false);
        let transcriber = FakeTranscriber::new(Reply::Hang);
        let ledger = ledger_with(Tier::Free, 0).await;

        let outcome = run(&transport, &transcriber, &ledger, &event(60, AudioKind::Voice)).await;

        assert_eq!(outcome, Outcome::DecodeFailed);
        assert_eq!(transport.sent().last().unwrap(), DECODE_FAILED);
        assert_eq!(ledger.get_consumed(USER, Tier::Free).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn first_seen_user_is_initialized_and_admitted() {
        let transport = FakeTransport::new(false);
        let transcriber = FakeTranscriber::new(Reply::Text("first".to_string()));
        let ledger = memory_ledger();

        let outcome = run(&transport, &transcriber, &ledger, &event(120, AudioKind::Audio)).await;

        assert_eq!(
            outcome,
            Outcome::Delivered {
                chunks: 1,
                remaining: Some(RemainingTime::from_seconds(180))
            }
        );
        assert_eq!(ledger.get_consumed(USER, Tier::Free).await.unwrap(), 120);
    }

    #[tokio::test]
    async fn too_long_free_audio_is_rejected_outright() {
        let transport = FakeTransport::new(false);
        let transcriber = FakeTranscriber::new(Reply::Text("never".to_string()));
        let ledger = memory_ledger();

        let outcome = run(&transport, &transcriber, &ledger, &event(301, AudioKind::Audio)).await;

        assert_eq!(
            outcome,
            Outcome::Rejected(Denial::DurationExceeded { max_minutes: 5 })
        );
        assert_eq!(transcriber.calls(), 0);
        assert!(matches!(
            ledger.get_consumed(USER, Tier::Free).await,
            Err(LedgerError::UserNotFound)
        ));
    }

    #[tokio::test]
    async fn blocked_user_gets_escalation_message() {
        let transport = FakeTransport::new(false);
        let transcriber = FakeTranscriber::new(Reply::Text("never".to_string()));
        let ledger = ledger_with(Tier::Free, 10).await;
        ledger.block_user(USER).await.unwrap();

        let outcome = run(&transport, &transcriber, &ledger, &event(10, AudioKind::Voice)).await;

        assert!(matches!(outcome, Outcome::Rejected(Denial::Blocked { .. })));
        assert_eq!(
            transport.sent(),
            vec![
                "Dear Sam, You have exceeded maximum numbers of free decoding of audio,to get premium - type /premium"
            ]
        );
        assert_eq!(transcriber.calls(), 0);
    }

    #[tokio::test]
    async fn unreadable_ledger_initializes_and_admits() {
        let transport = FakeTransport::new(false);
        let transcriber = FakeTranscriber::new(Reply::Text("still here".to_string()));
        let ledger = flaky_ledger(FlakyStore {
            fail_reads: true,
            ..FlakyStore::default()
        });

        let outcome = run(&transport, &transcriber, &ledger, &event(30, AudioKind::Audio)).await;

        assert_eq!(
            outcome,
            Outcome::Delivered {
                chunks: 1,
                remaining: Some(RemainingTime::from_seconds(270))
            }
        );
        assert_eq!(transcriber.calls(), 1);
        assert_eq!(
            transport.sent(),
            vec![
                DECODE_NOTICE,
                "Here is the script of the audio:",
                "still here",
                "Remaining free time: 04 minutes 30 seconds",
            ]
        );
    }

    #[tokio::test]
    async fn unreadable_ledger_that_cannot_initialize_is_rejected() {
        let transport = FakeTransport::new(false);
        let transcriber = FakeTranscriber::new(Reply::Text("never".to_string()));
        let ledger = flaky_ledger(FlakyStore {
            fail_reads: true,
            fail_create: true,
            ..FlakyStore::default()
        });

        let outcome = run(&transport, &transcriber, &ledger, &event(30, AudioKind::Audio)).await;

        assert_eq!(outcome, Outcome::Rejected(Denial::Unavailable));
        assert_eq!(transport.sent(), vec![UNAVAILABLE]);
        assert_eq!(transcriber.calls(), 0);
    }

    #[tokio::test]
    async fn failed_usage_write_still_delivers() {
        let transport = FakeTransport::new(false);
        let transcriber = FakeTranscriber::new(Reply::Text("kept".to_string()));
        let ledger = flaky_ledger(FlakyStore {
            fail_incr: true,
            ..FlakyStore::default()
        });

        let outcome = run(&transport, &transcriber, &ledger, &event(30, AudioKind::Audio)).await;

        assert_eq!(
            outcome,
            Outcome::Delivered {
                chunks: 1,
                remaining: None
            }
        );
        assert_eq!(
            transport.sent(),
            vec![DECODE_NOTICE, "Here is the script of the audio:", "kept"]
        );
    }

    #[tokio::test]
    async fn broken_delivery_is_still_charged() {
        // notice, header, first chunk go through; the second chunk fails
        let transport = FakeTransport::failing_on(4);
        let text = "𝄞".repeat(8000);
        let transcriber = FakeTranscriber::new(Reply::Text(text.clone()));
        let ledger = memory_ledger();

        let outcome = try_run(&transport, &transcriber, &ledger, &event(200, AudioKind::Voice))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            Outcome::Delivered {
                chunks: 1,
                remaining: Some(RemainingTime::from_seconds(100))
            }
        );
        assert_eq!(ledger.get_consumed(USER, Tier::Free).await.unwrap(), 200);

        let sent = transport.sent();
        assert_eq!(sent.len(), 4);
        assert_eq!(sent[2].chars().count(), 4000);
        assert_eq!(sent[3], "Remaining free time: 01 minutes 40 seconds");
    }

    #[tokio::test]
    async fn long_transcript_is_sent_in_chunks() {
        let transport = FakeTransport::new(false);
        let text = "ж".repeat(9000);
        let transcriber = FakeTranscriber::new(Reply::Text(text.clone()));
        let ledger = memory_ledger();

        let outcome = run(&transport, &transcriber, &ledger, &event(30, AudioKind::Audio)).await;

        assert!(matches!(outcome, Outcome::Delivered { chunks: 3, .. }));
        let sent = transport.sent();
        assert_eq!(sent[2..5].concat(), text);
        assert_eq!(sent[4].chars().count(), 1000);
    }
}
