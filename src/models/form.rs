//! 表单字段数据模型
//!
//! `FormField` 由字段分类器扫描文档时创建，之后不再修改；
//! `FieldValue` 由数据生成器按字段一对一创建；
//! `FilledDocument` 持有填充后的输出字节流。

use serde::{Deserialize, Serialize};

/// 字段语义类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldCategory {
    /// 普通文本输入
    Text,
    /// 日期
    Date,
    /// 签名
    Signature,
    /// 单选（固定选项集）
    ChoiceSingle,
    /// 多选（固定选项集）
    ChoiceMulti,
    /// 无法识别的字段（保留在序列中，但不参与必填校验）
    Unknown,
}

impl FieldCategory {
    /// 类别名称（用于日志和生成服务请求）
    pub fn as_str(self) -> &'static str {
        match self {
            FieldCategory::Text => "text",
            FieldCategory::Date => "date",
            FieldCategory::Signature => "signature",
            FieldCategory::ChoiceSingle => "choice-single",
            FieldCategory::ChoiceMulti => "choice-multi",
            FieldCategory::Unknown => "unknown",
        }
    }
}

/// 表单字段
///
/// 分类完成后即不可变；字段顺序与文档内部顺序一致。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormField {
    /// 字段标识（文档内唯一）
    pub id: String,
    /// 语义类别
    pub category: FieldCategory,
    /// 是否必填
    pub required: bool,
    /// 控件位置信息（原样透传，不做解释）
    pub rect: Option<[f32; 4]>,
    /// 传给生成服务的上下文提示
    pub hint: Option<String>,
    /// 选择类字段的允许值
    pub options: Vec<String>,
}

/// 字段值来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provenance {
    /// 生成服务返回的值
    AiGenerated,
    /// 确定性兜底值
    Fallback,
    /// 调用方直接提供的值
    UserSupplied,
}

/// 字段值
///
/// 一次填充中与 `FormField` 一一对应；创建后不再修改，
/// 只会被下一轮填充的新值取代。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldValue {
    /// 对应的字段标识
    pub field_id: String,
    /// 值内容
    pub value: String,
    /// 值来源
    pub provenance: Provenance,
    /// 生成服务应答了本批请求、但漏掉了这个字段
    ///
    /// 服务整体不可达时为 false（兜底是设计内路径）；
    /// 服务应答但缺这个字段时为 true（必填字段据此判定为未完成）。
    pub omitted_by_service: bool,
}

impl FieldValue {
    /// 生成服务返回的值
    pub fn ai(field_id: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field_id: field_id.into(),
            value: value.into(),
            provenance: Provenance::AiGenerated,
            omitted_by_service: false,
        }
    }

    /// 兜底值（服务整体失败）
    pub fn fallback(field_id: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field_id: field_id.into(),
            value: value.into(),
            provenance: Provenance::Fallback,
            omitted_by_service: false,
        }
    }

    /// 兜底值（服务有应答但漏掉了该字段）
    pub fn fallback_omitted(field_id: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field_id: field_id.into(),
            value: value.into(),
            provenance: Provenance::Fallback,
            omitted_by_service: true,
        }
    }

    /// 调用方提供的值
    pub fn user(field_id: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field_id: field_id.into(),
            value: value.into(),
            provenance: Provenance::UserSupplied,
            omitted_by_service: false,
        }
    }
}

/// 填充后的输出文档
///
/// 源文档从不被修改；每次填充都产生一个新的字节流。
#[derive(Debug, Clone)]
pub struct FilledDocument {
    /// 源文档标识（路径或 URL）
    pub source_id: String,
    /// 输出字节流
    pub bytes: Vec<u8>,
    /// 本次填充应用的全部字段值
    pub values: Vec<FieldValue>,
}
