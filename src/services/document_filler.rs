//! 文档填充服务 - 业务能力层
//!
//! 只负责"把值写进文档"能力，不关心流程
//!
//! 单次写入全部字段值，然后校验完整性：每个必填字段都要有一个
//! 可用的值，否则返回 `FillIncomplete` 并列出缺失字段，绝不
//! 悄悄产出一份半填的表单。输出是新的文档实例，源文档从不被修改，
//! 同一模板可以反复填充。

use std::collections::HashMap;

use tracing::{info, warn};

use crate::error::{FillError, Result};
use crate::infrastructure::PdfFormBackend;
use crate::models::{FieldCategory, FieldValue, FilledDocument, FormField, Provenance};

/// 文档填充服务
#[derive(Debug, Default)]
pub struct DocumentFiller;

impl DocumentFiller {
    pub fn new() -> Self {
        Self
    }

    /// 执行一次填充
    ///
    /// # 参数
    /// - `backend`: 文档协作方
    /// - `source_id`: 源文档标识（路径或 URL）
    /// - `source`: 源文档字节流（不会被修改）
    /// - `fields`: 分类后的字段序列
    /// - `values`: 生成的字段值（与字段一一对应）
    ///
    /// # 返回
    /// 填充后的新文档；必填字段缺值时返回 `FillIncomplete`
    pub fn fill(
        &self,
        backend: &dyn PdfFormBackend,
        source_id: &str,
        source: &[u8],
        fields: &[FormField],
        values: &[FieldValue],
    ) -> Result<FilledDocument> {
        info!("📝 开始填充文档: {} ({} 个值)", source_id, values.len());

        // 同一字段出现多个值时，后到的覆盖先到的
        let by_id: HashMap<&str, &FieldValue> = values
            .iter()
            .map(|v| (v.field_id.as_str(), v))
            .collect();

        let pairs: Vec<(String, String)> = values
            .iter()
            .filter(|v| !v.value.trim().is_empty())
            .map(|v| (v.field_id.clone(), v.value.clone()))
            .collect();

        let bytes = backend.write_values(source_id, source, &pairs)?;

        // 写入后校验完整性
        let missing = missing_required_fields(fields, &by_id);
        if !missing.is_empty() {
            warn!(
                "❌ 填充不完整，{} 个必填字段缺少有效值: {}",
                missing.len(),
                missing.join(", ")
            );
            return Err(FillError::Incomplete { missing }.into());
        }

        info!("✅ 文档填充完成: {}", source_id);
        Ok(FilledDocument {
            source_id: source_id.to_string(),
            bytes,
            values: values.to_vec(),
        })
    }
}

/// 找出没有可用值的必填字段
///
/// unknown 类别不参与校验；"服务应答但漏掉"的兜底值对必填字段
/// 不算有效值（整体兜底才是设计内路径）。
fn missing_required_fields(
    fields: &[FormField],
    by_id: &HashMap<&str, &FieldValue>,
) -> Vec<String> {
    fields
        .iter()
        .filter(|f| f.required && f.category != FieldCategory::Unknown)
        .filter(|f| match by_id.get(f.id.as_str()) {
            None => true,
            Some(v) => {
                v.value.trim().is_empty()
                    || (v.provenance == Provenance::Fallback && v.omitted_by_service)
            }
        })
        .map(|f| f.id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::infrastructure::RawField;

    /// 记录写入调用的假后端
    struct FakeBackend;

    impl PdfFormBackend for FakeBackend {
        fn read_fields(
            &self,
            _source: &str,
            _bytes: &[u8],
        ) -> Result<Vec<RawField>, crate::error::DocumentError> {
            Ok(Vec::new())
        }

        fn write_values(
            &self,
            _source: &str,
            bytes: &[u8],
            values: &[(String, String)],
        ) -> Result<Vec<u8>, crate::error::DocumentError> {
            // 输出 = 源 + 值数量，足够区分"新实例"
            let mut out = bytes.to_vec();
            out.push(values.len() as u8);
            Ok(out)
        }
    }

    fn field(id: &str, category: FieldCategory, required: bool) -> FormField {
        FormField {
            id: id.to_string(),
            category,
            required,
            rect: None,
            hint: None,
            options: Vec::new(),
        }
    }

    #[test]
    fn test_fill_success_with_all_required_values() {
        let fields = vec![
            field("buyer_name", FieldCategory::Text, true),
            field("dob", FieldCategory::Date, false),
        ];
        let values = vec![
            FieldValue::ai("buyer_name", "John Smith"),
            FieldValue::ai("dob", "01/09/1985"),
        ];

        let filler = DocumentFiller::new();
        let source = b"source".to_vec();
        let doc = filler
            .fill(&FakeBackend, "doc.pdf", &source, &fields, &values)
            .unwrap();

        assert_eq!(doc.source_id, "doc.pdf");
        assert_eq!(doc.values.len(), 2);
        // 源字节流不变，输出是新实例
        assert_eq!(source, b"source".to_vec());
        assert_ne!(doc.bytes, source);
    }

    #[test]
    fn test_fill_incomplete_lists_missing_required() {
        let fields = vec![
            field("buyer_name", FieldCategory::Text, true),
            field("seller_name", FieldCategory::Text, true),
        ];
        let values = vec![FieldValue::ai("buyer_name", "John Smith")];

        let filler = DocumentFiller::new();
        let err = filler
            .fill(&FakeBackend, "doc.pdf", b"source", &fields, &values)
            .unwrap_err();
        match err {
            AppError::Fill(FillError::Incomplete { missing }) => {
                assert_eq!(missing, vec!["seller_name".to_string()]);
            }
            other => panic!("期望 FillIncomplete，得到 {:?}", other),
        }
    }

    #[test]
    fn test_empty_required_value_counts_as_missing() {
        let fields = vec![field("buyer_name", FieldCategory::Text, true)];
        let values = vec![FieldValue::ai("buyer_name", "   ")];

        let filler = DocumentFiller::new();
        assert!(filler
            .fill(&FakeBackend, "doc.pdf", b"source", &fields, &values)
            .is_err());
    }

    #[test]
    fn test_unknown_fields_excluded_from_required_check() {
        let fields = vec![field("mystery", FieldCategory::Unknown, true)];
        let filler = DocumentFiller::new();
        let doc = filler
            .fill(&FakeBackend, "doc.pdf", b"source", &fields, &[])
            .unwrap();
        assert!(doc.values.is_empty());
    }

    /// 服务应答但漏掉签名字段的场景：签名必填与否决定成败
    #[test]
    fn test_omitted_signature_depends_on_required_flag() {
        let values = vec![
            FieldValue::ai("name", "John Smith"),
            FieldValue::ai("dob", "01/09/1985"),
            FieldValue::fallback_omitted("signature", "/s/ Auto-Signed"),
        ];
        let filler = DocumentFiller::new();

        // 签名非必填 → 成功
        let fields = vec![
            field("name", FieldCategory::Text, true),
            field("dob", FieldCategory::Date, true),
            field("signature", FieldCategory::Signature, false),
        ];
        let doc = filler
            .fill(&FakeBackend, "doc.pdf", b"source", &fields, &values)
            .unwrap();
        assert_eq!(doc.values.len(), 3);

        // 签名必填 → FillIncomplete
        let fields = vec![
            field("name", FieldCategory::Text, true),
            field("dob", FieldCategory::Date, true),
            field("signature", FieldCategory::Signature, true),
        ];
        let err = filler
            .fill(&FakeBackend, "doc.pdf", b"source", &fields, &values)
            .unwrap_err();
        match err {
            AppError::Fill(FillError::Incomplete { missing }) => {
                assert_eq!(missing, vec!["signature".to_string()]);
            }
            other => panic!("期望 FillIncomplete，得到 {:?}", other),
        }
    }

    /// 服务整体失败的兜底值对必填字段是有效的
    #[test]
    fn test_total_fallback_still_completes() {
        let fields = vec![field("signature", FieldCategory::Signature, true)];
        let values = vec![FieldValue::fallback("signature", "/s/ Auto-Signed")];

        let filler = DocumentFiller::new();
        assert!(filler
            .fill(&FakeBackend, "doc.pdf", b"source", &fields, &values)
            .is_ok());
    }
}
