use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Config;
use crate::routes::exercise::model::{ChoukaiExercise, DialogLine, Question};

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("upstream request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("no candidate text in model response")]
    MissingCandidate,
    #[error("no JSON object found in model output")]
    MissingJson,
    #[error("model output did not match the exercise shape: {0}")]
    InvalidShape(#[from] serde_json::Error),
}

// generateContent 接口的请求/响应结构，只建模用到的字段
#[derive(Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Content,
}

/// 生成式语言服务的客户端。对上层只暴露两个操作：
/// 生成练习、批改答案。
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_base: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: config.gemini_api_base.clone(),
            model: config.gemini_model.clone(),
            api_key: config.gemini_api_key.clone(),
        }
    }

    /// 按话题生成一套听力练习
    pub async fn generate_exercise(&self, topic: &str) -> Result<ChoukaiExercise, LlmError> {
        let raw = self.generate_content(build_generate_prompt(topic)).await?;
        let json = extract_json(&raw).ok_or(LlmError::MissingJson)?;
        let exercise = serde_json::from_str(json)?;
        Ok(exercise)
    }

    /// 批改用户作答，返回整理后的纯文本解析
    pub async fn grade_answer(
        &self,
        dialog: &[DialogLine],
        question: &Question,
        user_answer: &str,
    ) -> Result<String, LlmError> {
        let raw = self
            .generate_content(build_grade_prompt(dialog, question, user_answer))
            .await?;
        Ok(clean_analysis(&raw))
    }

    async fn generate_content(&self, prompt: String) -> Result<String, LlmError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.api_base, self.model, self.api_key
        );
        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
        };

        let response = self.http.post(&url).json(&body).send().await?;
        let data: GenerateContentResponse = response.json().await?;

        data.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or(LlmError::MissingCandidate)
    }
}

fn build_generate_prompt(topic: &str) -> String {
    format!(
        r#"按照 JLPT 真题风格，出一道 N4-N3 级别的听力（聴解）题。

话题：「{topic}」

响应 JSON 格式：
{{
  "dialog": [
    {{"speaker": "ナレーション", "text": "男の人は女の人と話しています。", "translation": "男人正在和女人说话。"}},
    {{"speaker": "男の人", "text": "こんにちは", "translation": "你好"}},
    {{"speaker": "女の人", "text": "こんにちは", "translation": "你好"}}
  ],
  "question": {{
    "context": "对话情境的简短说明",
    "instruction": "与对话内容对应的提问（JLPT 风格）",
    "options": ["日语选项A", "选项B", "选项C", "选项D"],
    "correct": "A"
  }}
}}

出题要求：
- 对话必须以 speaker 为「ナレーション」的一行旁白开头，内容为：男の人は女の人と話しています。
- 对话共 4 到 6 行，含旁白
- 对话词汇控制在 JLPT N4-N3 水平
- 旁白之后的 speaker 使用「男の人」和「女の人」
- 语体使用带 desu/masu 的日常口语，避免敬语或过于正式的表达
- 提问不限于「何をしますか」，也可以问意图、态度、下一步行动或言外之意
- 四个选项用日语书写，只有一个正确答案
- 只输出上述格式的 JSON，不要附加任何说明
"#
    )
}

fn build_grade_prompt(dialog: &[DialogLine], question: &Question, user_answer: &str) -> String {
    format!(
        r#"分析用户对下面这道 JLPT 听力题的作答：

对话：{dialog}
题目：{instruction}
选项：{options}
用户答案：{user_answer}
正确答案：{correct}

请用中文说明：
1. 为什么这个答案是正确的？
2. 对话里一步一步发生了什么
3. 用到的重点词汇或语法

直接输出普通文本，不要 JSON。"#,
        dialog = serde_json::to_string(dialog).unwrap_or_default(),
        instruction = question.instruction,
        options = question.options.join(", "),
        user_answer = user_answer,
        correct = question.correct,
    )
}

/// 从模型输出中截取第一个 `{` 到最后一个 `}` 之间的内容
fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

/// 清理模型输出里松散的标记符号，压成适合直接展示的纯文本
fn clean_analysis(raw: &str) -> String {
    let stripped: String = raw
        .chars()
        .filter(|c| !matches!(c, '*' | '_' | '-' | ';' | '`'))
        .collect();

    stripped
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
