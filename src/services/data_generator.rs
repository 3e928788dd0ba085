//! 数据生成服务 - 业务能力层
//!
//! 只负责"为字段生成值"能力，不关心流程
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型
//! - 兼容 OpenAI API 的服务（如 Azure, Gemini, Doubao 等）
//!
//! ## 关键性质
//! 整张表单的字段放进一个批量请求（值之间才会相互一致，
//! 例如 state 和 zip 在地理上对得上）；瞬时失败固定间隔重试，
//! 重试耗尽或响应不可解析时，每个字段都落到确定性兜底值。
//! 流水线永远不会因为生成服务卡住。

use std::collections::HashMap;

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use regex::Regex;
use serde_json::{Map, Value as JsonValue};
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::GenerationError;
use crate::models::{FieldCategory, FieldValue, FormField};

/// 数据生成服务客户端
///
/// 职责：
/// - 批量请求生成服务，为每个字段拿到一个值
/// - 瞬时失败重试，失败后落确定性兜底值
/// - 按字段记录值来源（ai-generated / fallback / user-supplied）
/// - 不出现 Vec<WorkflowRun> / 步骤序号
/// - 不关心流程顺序
pub struct DataGenerator {
    client: Client<OpenAIConfig>,
    model_name: String,
    max_retries: usize,
    retry_backoff: Duration,
}

impl DataGenerator {
    /// 创建新的数据生成客户端
    pub fn new(config: &Config) -> Self {
        // 配置 OpenAI 客户端（兼容 OpenAI API 的服务）
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        let client = Client::with_config(openai_config);

        Self {
            client,
            model_name: config.llm_model_name.clone(),
            max_retries: config.gen_max_retries,
            retry_backoff: Duration::from_secs(config.gen_retry_backoff_secs),
        }
    }

    /// 为一份文档的全部字段生成值
    ///
    /// 这个函数不会失败：服务不可用时每个字段都有兜底值。
    ///
    /// # 参数
    /// - `fields`: 分类后的字段序列
    /// - `user_supplied`: 调用方直接指定的值（按字段标识覆盖）
    ///
    /// # 返回
    /// 与字段一一对应的 `FieldValue` 列表
    pub async fn generate(
        &self,
        fields: &[FormField],
        user_supplied: &HashMap<String, String>,
    ) -> Vec<FieldValue> {
        if fields.is_empty() {
            return Vec::new();
        }

        info!("🤖 正在请求生成服务，共 {} 个字段...", fields.len());

        let response = match self.request_batch(fields).await {
            Ok(map) => {
                info!("✓ 生成服务返回 {} 个字段值", map.len());
                Some(map)
            }
            Err(e) => {
                warn!("⚠️ 生成服务不可用，全部使用兜底值: {}", e);
                None
            }
        };

        merge_response(fields, user_supplied, response.as_ref())
    }

    /// 发送批量请求并解析为 字段标识 → 值 的表
    ///
    /// 只有传输层错误参与重试；响应拿到手但解析不了，直接交给兜底。
    async fn request_batch(
        &self,
        fields: &[FormField],
    ) -> Result<Map<String, JsonValue>, GenerationError> {
        let (user_message, system_message) = build_batch_messages(fields);

        let attempts = self.max_retries + 1;
        let mut last_error = String::new();
        for attempt in 1..=attempts {
            match self.send_once(&user_message, &system_message).await {
                Ok(content) => return parse_values_json(&content),
                Err(e) => {
                    last_error = e;
                    if attempt < attempts {
                        warn!(
                            "生成服务调用失败 (尝试 {}/{}), {}秒后重试: {}",
                            attempt,
                            attempts,
                            self.retry_backoff.as_secs(),
                            last_error
                        );
                        sleep(self.retry_backoff).await;
                    }
                }
            }
        }
        Err(GenerationError::ServiceFailed {
            attempts,
            detail: last_error,
        })
    }

    /// 单次 API 调用
    async fn send_once(
        &self,
        user_message: &str,
        system_message: &str,
    ) -> Result<String, String> {
        debug!("调用生成服务，模型: {}", self.model_name);

        let system_msg = ChatCompletionRequestSystemMessageArgs::default()
            .content(system_message)
            .build()
            .map_err(|e| e.to_string())?;
        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(user_message)
            .build()
            .map_err(|e| e.to_string())?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(vec![
                ChatCompletionRequestMessage::System(system_msg),
                ChatCompletionRequestMessage::User(user_msg),
            ])
            .temperature(0.3)
            .max_tokens(2048u32)
            .build()
            .map_err(|e| e.to_string())?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| e.to_string())?;

        debug!("生成服务调用成功");

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| "返回内容为空".to_string())?;

        Ok(content.trim().to_string())
    }
}

/// 构建批量生成请求的消息
///
/// 返回 (user_message, system_message)
fn build_batch_messages(fields: &[FormField]) -> (String, String) {
    let system_message = "你是一个表单数据生成助手，负责为美国政府类表单生成一整条逼真、\
                          相互一致的英文记录。同一条记录内的值必须彼此吻合\
                          （例如 state 和 zip 要在地理上对应）。\
                          只返回一个严格的 JSON 对象，不要任何其他内容。"
        .to_string();

    let descriptors: Vec<JsonValue> = fields
        .iter()
        .map(|f| {
            let mut d = serde_json::json!({
                "id": f.id,
                "category": f.category.as_str(),
            });
            if let Some(hint) = &f.hint {
                d["hint"] = serde_json::json!(hint);
            }
            if !f.options.is_empty() {
                d["allowed_values"] = serde_json::json!(f.options);
            }
            d
        })
        .collect();

    let descriptors_json = serde_json::to_string_pretty(&descriptors).unwrap_or_default();

    let user_message = format!(
        r#"为下面的表单字段各生成一个值，整体作为同一条记录保持一致。

【要求】
- 值一律用英文
- date 类别用 MM/DD/YYYY 格式
- 有 allowed_values 的字段只能从中选择
- signature 类别给一个人名
- 返回一个 JSON 对象：键是字段 id，值是字符串；不要遗漏任何字段

字段列表：
{}"#,
        descriptors_json
    );

    (user_message, system_message)
}

/// 把响应文本解析为 字段标识 → 值 的表
///
/// 模型偶尔会包一层 markdown 代码块或者加说明文字，
/// 这里先整体解析，失败再提取第一个 JSON 对象。
fn parse_values_json(response: &str) -> Result<Map<String, JsonValue>, GenerationError> {
    let trimmed = response.trim();
    if trimmed.is_empty() {
        return Err(GenerationError::EmptyResponse);
    }

    if let Ok(JsonValue::Object(map)) = serde_json::from_str::<JsonValue>(trimmed) {
        return Ok(map);
    }

    let re = Regex::new(r"\{[\s\S]*\}").expect("JSON 提取正则无效");
    if let Some(m) = re.find(trimmed) {
        if let Ok(JsonValue::Object(map)) = serde_json::from_str::<JsonValue>(m.as_str()) {
            return Ok(map);
        }
    }

    Err(GenerationError::MalformedResponse {
        detail: crate::utils::logging::truncate_text(trimmed, 120),
    })
}

/// 合并服务响应、调用方覆盖值与兜底值
///
/// - 调用方提供的值最优先（user-supplied）
/// - 服务返回的非空值其次（ai-generated）
/// - 服务有应答但漏掉的字段：兜底且标记 omitted_by_service
/// - 服务整体失败：兜底（设计内路径，不做标记）
fn merge_response(
    fields: &[FormField],
    user_supplied: &HashMap<String, String>,
    response: Option<&Map<String, JsonValue>>,
) -> Vec<FieldValue> {
    fields
        .iter()
        .map(|field| {
            if let Some(value) = user_supplied.get(&field.id).filter(|v| !v.trim().is_empty()) {
                return FieldValue::user(&field.id, value.clone());
            }
            match response {
                Some(map) => match map.get(&field.id).and_then(value_as_string) {
                    Some(value) => FieldValue::ai(&field.id, value),
                    None => {
                        warn!("⚠️ 生成服务漏掉了字段 '{}'，使用兜底值", field.id);
                        FieldValue::fallback_omitted(&field.id, fallback_value(field))
                    }
                },
                None => FieldValue::fallback(&field.id, fallback_value(field)),
            }
        })
        .collect()
}

fn value_as_string(value: &JsonValue) -> Option<String> {
    let s = match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Null => return None,
        other => other.to_string(),
    };
    let s = s.trim().to_string();
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// 按类别给出确定性兜底值
///
/// 取值是实现层约定（不从真实 AI 供应商推断默认值）：
/// text → "N/A"，date → 今天 (MM/DD/YYYY)，signature → "/s/ Auto-Signed"，
/// 选择类 → 第一个允许值（没有就 "X"），unknown → "N/A"
pub fn fallback_value(field: &FormField) -> String {
    match field.category {
        FieldCategory::Text | FieldCategory::Unknown => "N/A".to_string(),
        FieldCategory::Date => chrono::Local::now().format("%m/%d/%Y").to_string(),
        FieldCategory::Signature => "/s/ Auto-Signed".to_string(),
        FieldCategory::ChoiceSingle | FieldCategory::ChoiceMulti => field
            .options
            .first()
            .cloned()
            .unwrap_or_else(|| "X".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Provenance;

    fn field(id: &str, category: FieldCategory) -> FormField {
        FormField {
            id: id.to_string(),
            category,
            required: false,
            rect: None,
            hint: None,
            options: Vec::new(),
        }
    }

    #[test]
    fn test_parse_values_json_plain_object() {
        let map = parse_values_json(r#"{"buyer_name": "John Smith"}"#).unwrap();
        assert_eq!(map["buyer_name"], "John Smith");
    }

    #[test]
    fn test_parse_values_json_with_code_fence() {
        let response = "好的，结果如下：\n```json\n{\"dob\": \"01/09/1985\"}\n```";
        let map = parse_values_json(response).unwrap();
        assert_eq!(map["dob"], "01/09/1985");
    }

    #[test]
    fn test_parse_values_json_rejects_garbage() {
        assert!(matches!(
            parse_values_json("完全不是 JSON"),
            Err(GenerationError::MalformedResponse { .. })
        ));
        assert!(matches!(
            parse_values_json("   "),
            Err(GenerationError::EmptyResponse)
        ));
    }

    #[test]
    fn test_merge_full_response() {
        let fields = vec![
            field("buyer_name", FieldCategory::Text),
            field("dob", FieldCategory::Date),
        ];
        let mut map = Map::new();
        map.insert("buyer_name".into(), "John Smith".into());
        map.insert("dob".into(), "01/09/1985".into());

        let values = merge_response(&fields, &HashMap::new(), Some(&map));
        assert_eq!(values.len(), 2);
        assert!(values
            .iter()
            .all(|v| v.provenance == Provenance::AiGenerated));
    }

    #[test]
    fn test_merge_partial_response_marks_omitted() {
        let fields = vec![
            field("buyer_name", FieldCategory::Text),
            field("signature1", FieldCategory::Signature),
        ];
        let mut map = Map::new();
        map.insert("buyer_name".into(), "John Smith".into());

        let values = merge_response(&fields, &HashMap::new(), Some(&map));
        assert_eq!(values[0].provenance, Provenance::AiGenerated);
        assert_eq!(values[1].provenance, Provenance::Fallback);
        assert!(values[1].omitted_by_service);
        assert_eq!(values[1].value, "/s/ Auto-Signed");
    }

    #[test]
    fn test_merge_total_outage_falls_back_everywhere() {
        let fields = vec![
            field("buyer_name", FieldCategory::Text),
            field("contract_date", FieldCategory::Date),
        ];
        let values = merge_response(&fields, &HashMap::new(), None);
        assert_eq!(values.len(), 2);
        for v in &values {
            assert_eq!(v.provenance, Provenance::Fallback);
            assert!(!v.omitted_by_service);
            assert!(!v.value.is_empty());
        }
    }

    #[test]
    fn test_merge_user_supplied_wins() {
        let fields = vec![field("buyer_name", FieldCategory::Text)];
        let mut user = HashMap::new();
        user.insert("buyer_name".to_string(), "Alex Chen".to_string());

        let values = merge_response(&fields, &user, None);
        assert_eq!(values[0].provenance, Provenance::UserSupplied);
        assert_eq!(values[0].value, "Alex Chen");
    }

    #[test]
    fn test_fallback_values_per_category() {
        assert_eq!(fallback_value(&field("a", FieldCategory::Text)), "N/A");
        assert_eq!(
            fallback_value(&field("s", FieldCategory::Signature)),
            "/s/ Auto-Signed"
        );

        let mut choice = field("c", FieldCategory::ChoiceSingle);
        assert_eq!(fallback_value(&choice), "X");
        choice.options = vec!["TX".to_string(), "CA".to_string()];
        assert_eq!(fallback_value(&choice), "TX");

        // 日期兜底用当天，格式固定
        let date = fallback_value(&field("d", FieldCategory::Date));
        assert_eq!(date.len(), 10);
        assert_eq!(&date[2..3], "/");
        assert_eq!(&date[5..6], "/");
    }

    #[test]
    fn test_build_batch_messages_lists_every_field() {
        let mut choice = field("property_state", FieldCategory::ChoiceSingle);
        choice.options = vec!["TX".to_string()];
        let fields = vec![field("buyer_name", FieldCategory::Text), choice];

        let (user_message, system_message) = build_batch_messages(&fields);
        assert!(user_message.contains("buyer_name"));
        assert!(user_message.contains("property_state"));
        assert!(user_message.contains("allowed_values"));
        assert!(system_message.contains("JSON"));
    }
}
