use std::fs;
use std::io;
use std::path::PathBuf;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::routes::exercise::model::{DialogLine, Question};

/// 客户端缓存的最近一次练习。整体覆盖写入，
/// 恢复时只看文件在不在，不做新鲜度检查。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseSession {
    pub dialog: Vec<DialogLine>,
    pub question: Question,
    pub topic: String,
    pub timestamp: i64,
}

impl ExerciseSession {
    pub fn new(dialog: Vec<DialogLine>, question: Question, topic: String) -> Self {
        Self {
            dialog,
            question,
            topic,
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}

/// 单文件会话存储，对应浏览器端的那一条 local-storage 记录
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn default_path() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("choukai")
            .join("last_session.json")
    }

    pub fn save(&self, session: &ExerciseSession) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(session).map_err(io::Error::other)?;
        fs::write(&self.path, json)
    }

    /// 读不到或解析不了都当作没有缓存
    pub fn load(&self) -> Option<ExerciseSession> {
        let data = fs::read_to_string(&self.path).ok()?;
        serde_json::from_str(&data).ok()
    }

    pub fn clear(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store(name: &str) -> SessionStore {
        let path = std::env::temp_dir()
            .join("choukai-session-tests")
            .join(format!("{}-{}.json", name, std::process::id()));
        let store = SessionStore::new(path);
        let _ = store.clear();
        store
    }

    fn sample_session() -> ExerciseSession {
        ExerciseSession::new(
            vec![DialogLine {
                speaker: "ナレーション".to_string(),
                text: "男の人は女の人と話しています。".to_string(),
                translation: "男人正在和女人说话。".to_string(),
            }],
            Question {
                context: "会話の場面".to_string(),
                instruction: "二人は何について話していますか。".to_string(),
                options: [
                    "天気".to_string(),
                    "仕事".to_string(),
                    "買い物".to_string(),
                    "旅行".to_string(),
                ],
                correct: "C".to_string(),
            },
            "コンビニで買い物".to_string(),
        )
    }

    #[test]
    fn save_then_load_round_trips_the_session() {
        let store = temp_store("round-trip");
        let session = sample_session();

        store.save(&session).unwrap();
        let restored = store.load().expect("saved session should load");

        assert_eq!(restored.dialog, session.dialog);
        assert_eq!(restored.question, session.question);
        assert_eq!(restored.topic, session.topic);

        store.clear().unwrap();
    }

    #[test]
    fn load_returns_none_when_nothing_saved() {
        let store = temp_store("missing");
        assert!(store.load().is_none());
    }

    #[test]
    fn load_returns_none_for_corrupt_cache() {
        let store = temp_store("corrupt");
        fs::create_dir_all(store.path.parent().unwrap()).unwrap();
        fs::write(&store.path, "not json").unwrap();

        assert!(store.load().is_none());

        store.clear().unwrap();
    }

    #[test]
    fn save_overwrites_the_previous_session() {
        let store = temp_store("overwrite");
        let first = sample_session();
        store.save(&first).unwrap();

        let mut second = sample_session();
        second.topic = "ラーメンを注文する".to_string();
        store.save(&second).unwrap();

        assert_eq!(store.load().unwrap().topic, "ラーメンを注文する");

        store.clear().unwrap();
    }

    #[test]
    fn clear_is_idempotent() {
        let store = temp_store("clear");
        store.save(&sample_session()).unwrap();

        store.clear().unwrap();
        store.clear().unwrap();
        assert!(store.load().is_none());
    }
}
