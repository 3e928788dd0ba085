//! 字段分类服务 - 业务能力层
//!
//! 只负责"给字段定语义类别"能力，不关心流程
//!
//! 分类规则按优先级从高到低：
//! 1. 签名控件 → signature
//! 2. 字段名命中日期词表（"date" / "dob" / "signed" 子串）→ date
//! 3. 有固定允许值集合的控件 → choice-single / choice-multi
//! 4. 文本输入控件 → text
//! 5. 其他 → unknown（保留在序列中，但不参与必填校验）

use tracing::{debug, info};

use crate::error::Result;
use crate::infrastructure::{PdfFormBackend, RawField, RawFieldKind};
use crate::models::{FieldCategory, FormField};

/// 日期字段名词表（子串匹配，大小写不敏感）
static DATE_NAME_VOCAB: phf::Set<&'static str> = phf::phf_set! {
    "date",
    "dob",
    "signed",
};

/// 字段分类服务
///
/// 职责：
/// - 把原始控件记录翻译成带语义类别的 `FormField`
/// - 保持文档内部字段顺序，分类是幂等的
/// - 不出现 PDF 结构细节
/// - 不关心流程顺序
#[derive(Debug, Default)]
pub struct FieldClassifier;

impl FieldClassifier {
    pub fn new() -> Self {
        Self
    }

    /// 扫描文档并产出有序的字段序列
    ///
    /// # 参数
    /// - `backend`: 文档协作方
    /// - `source`: 源文档标识（路径或 URL）
    /// - `bytes`: 源文档字节流
    ///
    /// # 返回
    /// 与文档内部顺序一致的 `FormField` 序列；文档损坏时整体失败
    pub fn classify_document(
        &self,
        backend: &dyn PdfFormBackend,
        source: &str,
        bytes: &[u8],
    ) -> Result<Vec<FormField>> {
        let raw = backend.read_fields(source, bytes)?;
        info!("🔍 {} 共发现 {} 个表单字段", source, raw.len());

        let fields: Vec<FormField> = raw.iter().map(|f| self.classify_one(f)).collect();

        for field in &fields {
            debug!(
                "字段 '{}' → {} (必填: {})",
                field.id,
                field.category.as_str(),
                field.required
            );
        }
        Ok(fields)
    }

    /// 对单个控件应用分类规则
    fn classify_one(&self, raw: &RawField) -> FormField {
        let category = if raw.kind == RawFieldKind::Signature {
            FieldCategory::Signature
        } else if name_looks_like_date(&raw.name) {
            FieldCategory::Date
        } else if matches!(raw.kind, RawFieldKind::Choice | RawFieldKind::Button) {
            if raw.multi_select {
                FieldCategory::ChoiceMulti
            } else {
                FieldCategory::ChoiceSingle
            }
        } else if raw.kind == RawFieldKind::Text {
            FieldCategory::Text
        } else {
            FieldCategory::Unknown
        };

        FormField {
            id: raw.name.clone(),
            category,
            required: raw.required,
            rect: raw.rect,
            hint: hint_from_name(&raw.name),
            options: raw.options.clone(),
        }
    }
}

/// 字段名是否命中日期词表
fn name_looks_like_date(name: &str) -> bool {
    let lower = name.to_lowercase();
    DATE_NAME_VOCAB.iter().any(|word| lower.contains(word))
}

/// 从字段名推导生成服务的上下文提示
///
/// "buyer_name" → "buyer name"；对语义不明的短名（纯数字等）不给提示
fn hint_from_name(name: &str) -> Option<String> {
    let humanized = name.replace(['_', '-'], " ").trim().to_string();
    if humanized.is_empty() || humanized.chars().all(|c| c.is_ascii_digit()) {
        None
    } else {
        Some(humanized)
    }
}
