use serde::{Deserialize, Serialize};

/// 对话中的一句台词，生成后不再修改，顺序即朗读顺序
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogLine {
    pub speaker: String,
    pub text: String,
    pub translation: String,
}

/// 听力题干。四个选项定长，正确答案为 "A".."D" 之一
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub context: String,
    pub instruction: String,
    pub options: [String; 4],
    pub correct: String,
}

/// 一套完整的听力练习，也是 generate 接口的响应体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoukaiExercise {
    pub dialog: Vec<DialogLine>,
    pub question: Question,
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub topic: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckAnswerRequest {
    pub dialog: Vec<DialogLine>,
    pub question: Question,
    pub user_answer: String,
}

#[derive(Debug, Serialize)]
pub struct CheckAnswerResponse {
    pub analysis: String,
}
