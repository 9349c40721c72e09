use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::time::sleep;

use crate::routes::exercise::model::{DialogLine, Question};

pub const JAPANESE_LANG_TAG: &str = "ja-JP";
pub const SPEAKING_RATE: f32 = 1.0;

const PAUSE_AFTER_INSTRUCTION: Duration = Duration::from_millis(1500);
const PAUSE_BETWEEN_LINES: Duration = Duration::from_millis(1000);
const PAUSE_BEFORE_REPEAT: Duration = Duration::from_millis(1500);
const PAUSE_BEFORE_REVEAL: Duration = Duration::from_millis(1000);

/// 语音合成引擎。`speak` 在整段播完后才返回，
/// 这个完成信号是链路推进的唯一依据。
pub trait SpeechEngine: Send + Sync {
    fn speak(&self, text: &str, lang: &str, rate: f32) -> impl Future<Output = ()> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    Completed,
    /// 已有链路在播，本次触发不产生任何朗读
    Busy,
    /// 在两段朗读之间被取消，正在播的那段不会被打断
    Cancelled,
}

/// 按固定顺序驱动朗读链：题干 → 每句对话 → 重复题干，
/// 全部播完后才亮出选项。同一时刻只允许一条链在跑。
pub struct NarrationSequencer<E> {
    engine: E,
    busy: AtomicBool,
    cancelled: AtomicBool,
    options_revealed: Arc<AtomicBool>,
}

impl<E: SpeechEngine> NarrationSequencer<E> {
    pub fn new(engine: E) -> Self {
        Self::with_reveal_flag(engine, Arc::new(AtomicBool::new(false)))
    }

    /// 选项可见标志由外部共享时使用（渲染层据此决定是否显示选项）
    pub fn with_reveal_flag(engine: E, options_revealed: Arc<AtomicBool>) -> Self {
        Self {
            engine,
            busy: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
            options_revealed,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    pub fn options_revealed(&self) -> bool {
        self.options_revealed.load(Ordering::SeqCst)
    }

    pub fn reveal_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.options_revealed)
    }

    /// 请求在下一段朗读开始前停下来
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// 强制清掉占用标志。完成回调永远不来时的逃生口，
    /// 正常流程不需要调用。
    pub fn reset(&self) {
        self.busy.store(false, Ordering::SeqCst);
        self.cancelled.store(false, Ordering::SeqCst);
    }

    /// 完整流程：读题 → 停顿 → 逐句对话 → 停顿 → 再读题 → 亮出选项
    pub async fn play_full(&self, dialog: &[DialogLine], question: &Question) -> PlayOutcome {
        if self.busy.swap(true, Ordering::SeqCst) {
            return PlayOutcome::Busy;
        }
        self.cancelled.store(false, Ordering::SeqCst);
        self.options_revealed.store(false, Ordering::SeqCst);

        self.speak(&question.instruction).await;
        sleep(PAUSE_AFTER_INSTRUCTION).await;

        for (i, line) in dialog.iter().enumerate() {
            if i > 0 {
                sleep(PAUSE_BETWEEN_LINES).await;
            }
            if self.cancelled.load(Ordering::SeqCst) {
                return self.finish(PlayOutcome::Cancelled);
            }
            self.speak(&line.text).await;
        }

        sleep(PAUSE_BEFORE_REPEAT).await;
        if self.cancelled.load(Ordering::SeqCst) {
            return self.finish(PlayOutcome::Cancelled);
        }
        self.speak(&question.instruction).await;
        sleep(PAUSE_BEFORE_REVEAL).await;

        self.options_revealed.store(true, Ordering::SeqCst);
        self.finish(PlayOutcome::Completed)
    }

    /// 只重播对话，不读题也不亮选项
    pub async fn play_dialog_only(&self, dialog: &[DialogLine]) -> PlayOutcome {
        if self.busy.swap(true, Ordering::SeqCst) {
            return PlayOutcome::Busy;
        }
        self.cancelled.store(false, Ordering::SeqCst);

        for (i, line) in dialog.iter().enumerate() {
            if i > 0 {
                sleep(PAUSE_BETWEEN_LINES).await;
            }
            if self.cancelled.load(Ordering::SeqCst) {
                return self.finish(PlayOutcome::Cancelled);
            }
            self.speak(&line.text).await;
        }

        self.finish(PlayOutcome::Completed)
    }

    async fn speak(&self, text: &str) {
        self.engine.speak(text, JAPANESE_LANG_TAG, SPEAKING_RATE).await;
    }

    fn finish(&self, outcome: PlayOutcome) -> PlayOutcome {
        self.busy.store(false, Ordering::SeqCst);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    use tokio::sync::Notify;

    use super::*;

    fn line(text: &str) -> DialogLine {
        DialogLine {
            speaker: "男の人".to_string(),
            text: text.to_string(),
            translation: String::new(),
        }
    }

    fn five_line_dialog() -> Vec<DialogLine> {
        (1..=5).map(|i| line(&format!("せりふ{}", i))).collect()
    }

    fn question() -> Question {
        Question {
            context: "会話の場面".to_string(),
            instruction: "男の人はこれから何をしますか。".to_string(),
            options: [
                "あ".to_string(),
                "い".to_string(),
                "う".to_string(),
                "え".to_string(),
            ],
            correct: "A".to_string(),
        }
    }

    /// 记录每段朗读的文本，以及朗读那一刻选项是否已经可见
    #[derive(Clone)]
    struct RecordingEngine {
        spoken: Arc<Mutex<Vec<(String, bool)>>>,
        revealed: Arc<AtomicBool>,
    }

    impl RecordingEngine {
        fn new(revealed: Arc<AtomicBool>) -> Self {
            Self {
                spoken: Arc::new(Mutex::new(Vec::new())),
                revealed,
            }
        }

        fn texts(&self) -> Vec<String> {
            self.spoken
                .lock()
                .unwrap()
                .iter()
                .map(|(t, _)| t.clone())
                .collect()
        }
    }

    impl SpeechEngine for RecordingEngine {
        async fn speak(&self, text: &str, lang: &str, rate: f32) {
            assert_eq!(lang, JAPANESE_LANG_TAG);
            assert_eq!(rate, SPEAKING_RATE);
            self.spoken
                .lock()
                .unwrap()
                .push((text.to_string(), self.revealed.load(Ordering::SeqCst)));
        }
    }

    /// 第一段朗读会卡在闸门上，之后的朗读立即完成
    #[derive(Clone)]
    struct GatedEngine {
        gate: Arc<Notify>,
        calls: Arc<AtomicUsize>,
        spoken: Arc<Mutex<Vec<String>>>,
    }

    impl GatedEngine {
        fn new() -> Self {
            Self {
                gate: Arc::new(Notify::new()),
                calls: Arc::new(AtomicUsize::new(0)),
                spoken: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl SpeechEngine for GatedEngine {
        async fn speak(&self, text: &str, _lang: &str, _rate: f32) {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            self.spoken.lock().unwrap().push(text.to_string());
            if call == 0 {
                self.gate.notified().await;
            }
        }
    }

    async fn wait_for_first_utterance(engine: &GatedEngine) {
        while engine.spoken.lock().unwrap().is_empty() {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn full_flow_speaks_question_dialog_question_then_reveals() {
        let revealed = Arc::new(AtomicBool::new(false));
        let engine = RecordingEngine::new(Arc::clone(&revealed));
        let sequencer = NarrationSequencer::with_reveal_flag(engine.clone(), revealed);

        let dialog = five_line_dialog();
        let q = question();
        let outcome = sequencer.play_full(&dialog, &q).await;

        assert_eq!(outcome, PlayOutcome::Completed);
        assert_eq!(
            engine.texts(),
            vec![
                "男の人はこれから何をしますか。",
                "せりふ1",
                "せりふ2",
                "せりふ3",
                "せりふ4",
                "せりふ5",
                "男の人はこれから何をしますか。",
            ]
        );
        // 七段朗读期间选项始终不可见，全部播完才亮出
        assert!(engine.spoken.lock().unwrap().iter().all(|(_, seen)| !seen));
        assert!(sequencer.options_revealed());
        assert!(!sequencer.is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn dialog_only_never_reveals_options() {
        let revealed = Arc::new(AtomicBool::new(false));
        let engine = RecordingEngine::new(Arc::clone(&revealed));
        let sequencer = NarrationSequencer::with_reveal_flag(engine.clone(), revealed);

        let outcome = sequencer.play_dialog_only(&five_line_dialog()).await;

        assert_eq!(outcome, PlayOutcome::Completed);
        assert_eq!(engine.texts().len(), 5);
        assert!(!sequencer.options_revealed());
        assert!(!sequencer.is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn retrigger_while_running_is_a_noop() {
        let engine = GatedEngine::new();
        let sequencer = Arc::new(NarrationSequencer::new(engine.clone()));

        let dialog = five_line_dialog();
        let q = question();
        let running = tokio::spawn({
            let sequencer = Arc::clone(&sequencer);
            let dialog = dialog.clone();
            let q = q.clone();
            async move { sequencer.play_full(&dialog, &q).await }
        });

        wait_for_first_utterance(&engine).await;
        assert_eq!(sequencer.play_full(&dialog, &q).await, PlayOutcome::Busy);
        assert_eq!(engine.spoken.lock().unwrap().len(), 1);

        engine.gate.notify_one();
        assert_eq!(running.await.unwrap(), PlayOutcome::Completed);
        assert_eq!(engine.spoken.lock().unwrap().len(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_between_utterances_and_frees_the_chain() {
        let engine = GatedEngine::new();
        let sequencer = Arc::new(NarrationSequencer::new(engine.clone()));

        let dialog = five_line_dialog();
        let q = question();
        let running = tokio::spawn({
            let sequencer = Arc::clone(&sequencer);
            let dialog = dialog.clone();
            let q = q.clone();
            async move { sequencer.play_full(&dialog, &q).await }
        });

        wait_for_first_utterance(&engine).await;
        sequencer.cancel();
        engine.gate.notify_one();

        assert_eq!(running.await.unwrap(), PlayOutcome::Cancelled);
        // 只有题干那一段播了出来
        assert_eq!(engine.spoken.lock().unwrap().len(), 1);
        assert!(!sequencer.is_busy());

        // 取消后可以立刻重新触发
        let outcome = sequencer.play_dialog_only(&dialog).await;
        assert_eq!(outcome, PlayOutcome::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_recovers_from_a_stalled_completion_callback() {
        let engine = GatedEngine::new();
        let sequencer = Arc::new(NarrationSequencer::new(engine.clone()));

        let dialog = five_line_dialog();
        let q = question();
        let stalled = tokio::spawn({
            let sequencer = Arc::clone(&sequencer);
            let dialog = dialog.clone();
            let q = q.clone();
            async move { sequencer.play_full(&dialog, &q).await }
        });

        // 第一段朗读永远不完成，链路卡死
        wait_for_first_utterance(&engine).await;
        assert_eq!(
            sequencer.play_dialog_only(&dialog).await,
            PlayOutcome::Busy
        );

        sequencer.reset();
        assert_eq!(
            sequencer.play_dialog_only(&dialog).await,
            PlayOutcome::Completed
        );

        stalled.abort();
    }
}
