//! PDF 表单后端 - 基础设施层
//!
//! 文档协作方：从 PDF 字节流中读取 AcroForm 字段清单，
//! 并把一组字段值写回到文档的新副本中。
//!
//! 职责：
//! - 只做 PDF 结构层面的读写
//! - 不认识语义类别（分类是 `FieldClassifier` 的事）
//! - 源字节流从不被修改，写入总是产生新的字节流

use std::collections::HashMap;

use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::{debug, warn};

use crate::error::DocumentError;

/// 字段标志位（PDF 规范 Ff 位，1 起计位）
const FF_REQUIRED: i64 = 1 << 1;
const FF_PUSHBUTTON: i64 = 1 << 16;
const FF_MULTISELECT: i64 = 1 << 21;

/// 原始表单字段（未分类）
///
/// 顺序与文档内部 Fields 数组一致，重复读取同一文档得到相同序列。
#[derive(Debug, Clone, PartialEq)]
pub struct RawField {
    /// 字段全名（含父字段前缀）
    pub name: String,
    /// 控件种类
    pub kind: RawFieldKind,
    /// 必填标志（Ff 第 2 位）
    pub required: bool,
    /// 多选标志（仅选择类控件有意义）
    pub multi_select: bool,
    /// 允许值（选择类控件的 Opt 导出值）
    pub options: Vec<String>,
    /// 控件位置（原样透传）
    pub rect: Option<[f32; 4]>,
}

/// 控件种类（PDF FT 条目）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawFieldKind {
    /// 文本输入 (/Tx)
    Text,
    /// 列表 / 下拉选择 (/Ch)
    Choice,
    /// 复选框 / 单选组 (/Btn，非按钮)
    Button,
    /// 纯按钮 (/Btn 且 Pushbutton 位)
    PushButton,
    /// 签名 (/Sig)
    Signature,
    /// 其他
    Other,
}

/// 文档协作方能力接口
pub trait PdfFormBackend: Send + Sync {
    /// 读取字段清单
    ///
    /// 任何字段不可读都按整体损坏处理：部分字段清单会导致表单
    /// 被悄悄少填，宁可整体失败。
    fn read_fields(&self, source: &str, bytes: &[u8]) -> Result<Vec<RawField>, DocumentError>;

    /// 把字段值写入文档的新副本并返回输出字节流
    fn write_values(
        &self,
        source: &str,
        bytes: &[u8],
        values: &[(String, String)],
    ) -> Result<Vec<u8>, DocumentError>;
}

/// 基于 lopdf 的文档后端
#[derive(Debug, Default)]
pub struct LopdfBackend;

impl LopdfBackend {
    pub fn new() -> Self {
        Self
    }
}

impl PdfFormBackend for LopdfBackend {
    fn read_fields(&self, source: &str, bytes: &[u8]) -> Result<Vec<RawField>, DocumentError> {
        let doc = load_document(source, bytes)?;
        let mut fields = Vec::new();
        for entry in form_field_entries(source, &doc)? {
            walk_field(source, &doc, &entry, None, &mut fields)?;
        }
        debug!("从 {} 读取到 {} 个表单字段", source, fields.len());
        Ok(fields)
    }

    fn write_values(
        &self,
        source: &str,
        bytes: &[u8],
        values: &[(String, String)],
    ) -> Result<Vec<u8>, DocumentError> {
        let mut doc = load_document(source, bytes)?;

        // 先用不可变遍历收集 字段全名 → 对象ID，再按 ID 逐个修改
        let mut slots: HashMap<String, (ObjectId, RawFieldKind)> = HashMap::new();
        for entry in form_field_entries(source, &doc)? {
            collect_slots(source, &doc, &entry, None, &mut slots)?;
        }

        for (name, value) in values {
            let Some((id, kind)) = slots.get(name) else {
                warn!("⚠️ 文档中没有字段 '{}'，跳过写入", name);
                continue;
            };
            let dict = doc
                .get_object_mut(*id)
                .and_then(Object::as_dict_mut)
                .map_err(|e| DocumentError::WriteFailed {
                    name: name.clone(),
                    detail: e.to_string(),
                })?;
            match kind {
                // 复选框 / 单选组的值是名字对象，同时要更新外观状态
                RawFieldKind::Button => {
                    dict.set("V", Object::Name(value.as_bytes().to_vec()));
                    dict.set("AS", Object::Name(value.as_bytes().to_vec()));
                }
                _ => {
                    dict.set("V", Object::string_literal(value.as_str()));
                }
            }
            debug!("已写入字段 '{}'", name);
        }

        set_need_appearances(&mut doc);

        let mut out = Vec::new();
        doc.save_to(&mut out).map_err(|e| DocumentError::Corrupt {
            path: source.to_string(),
            detail: format!("保存输出文档失败: {}", e),
        })?;
        Ok(out)
    }
}

fn load_document(source: &str, bytes: &[u8]) -> Result<Document, DocumentError> {
    Document::load_mem(bytes).map_err(|e| DocumentError::Unreadable {
        path: source.to_string(),
        source: e,
    })
}

/// 取出 AcroForm 的 Fields 数组
fn form_field_entries(source: &str, doc: &Document) -> Result<Vec<Object>, DocumentError> {
    let catalog = doc.catalog().map_err(|e| DocumentError::Corrupt {
        path: source.to_string(),
        detail: format!("缺少文档目录: {}", e),
    })?;
    let acro_obj = catalog
        .get(b"AcroForm")
        .map_err(|_| DocumentError::NoForm {
            path: source.to_string(),
        })?;
    let acro = resolve(doc, acro_obj)
        .and_then(Object::as_dict)
        .map_err(|e| DocumentError::Corrupt {
            path: source.to_string(),
            detail: format!("AcroForm 不可读: {}", e),
        })?;
    let fields = acro
        .get(b"Fields")
        .and_then(|f| resolve(doc, f))
        .and_then(Object::as_array)
        .map_err(|e| DocumentError::Corrupt {
            path: source.to_string(),
            detail: format!("Fields 数组不可读: {}", e),
        })?;
    Ok(fields.clone())
}

/// 解引用（最多跟随 4 层引用）
fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> lopdf::Result<&'a Object> {
    let mut current = obj;
    for _ in 0..4 {
        match current {
            Object::Reference(id) => current = doc.get_object(*id)?,
            _ => return Ok(current),
        }
    }
    Ok(current)
}

fn corrupt(source: &str, detail: impl Into<String>) -> DocumentError {
    DocumentError::Corrupt {
        path: source.to_string(),
        detail: detail.into(),
    }
}

/// 深度优先遍历字段树，收集终端字段
fn walk_field(
    source: &str,
    doc: &Document,
    entry: &Object,
    prefix: Option<&str>,
    out: &mut Vec<RawField>,
) -> Result<(), DocumentError> {
    let dict = resolve(doc, entry)
        .and_then(Object::as_dict)
        .map_err(|e| corrupt(source, format!("字段条目不可读: {}", e)))?;

    let partial_name = field_name(doc, dict);
    let full_name = join_name(prefix, partial_name.as_deref());

    if let Some(kids) = field_kids(doc, dict) {
        // 子条目本身还是字段（带 T）时继续下钻，否则这里就是终端字段
        if kids_are_fields(doc, &kids) {
            let parent = full_name
                .ok_or_else(|| corrupt(source, "父字段缺少名称 (T)".to_string()))?;
            for kid in &kids {
                walk_field(source, doc, kid, Some(&parent), out)?;
            }
            return Ok(());
        }
    }

    let name =
        full_name.ok_or_else(|| corrupt(source, "终端字段缺少名称 (T)，无法按标识填充"))?;
    let flags = field_flags(doc, dict);
    let kind = field_kind(doc, dict, flags);

    out.push(RawField {
        name,
        kind,
        required: flags & FF_REQUIRED != 0,
        multi_select: flags & FF_MULTISELECT != 0,
        options: field_options(doc, dict),
        rect: field_rect(doc, dict),
    });
    Ok(())
}

/// 与 `walk_field` 同构的遍历，但记录 名称 → 对象ID（写入用）
fn collect_slots(
    source: &str,
    doc: &Document,
    entry: &Object,
    prefix: Option<&str>,
    out: &mut HashMap<String, (ObjectId, RawFieldKind)>,
) -> Result<(), DocumentError> {
    let id = match entry {
        Object::Reference(id) => Some(*id),
        _ => None,
    };
    let dict = resolve(doc, entry)
        .and_then(Object::as_dict)
        .map_err(|e| corrupt(source, format!("字段条目不可读: {}", e)))?;

    let partial_name = field_name(doc, dict);
    let full_name = join_name(prefix, partial_name.as_deref());

    if let Some(kids) = field_kids(doc, dict) {
        if kids_are_fields(doc, &kids) {
            let parent =
                full_name.ok_or_else(|| corrupt(source, "父字段缺少名称 (T)".to_string()))?;
            for kid in &kids {
                collect_slots(source, doc, kid, Some(&parent), out)?;
            }
            return Ok(());
        }
    }

    let name =
        full_name.ok_or_else(|| corrupt(source, "终端字段缺少名称 (T)，无法按标识填充"))?;
    let flags = field_flags(doc, dict);
    let kind = field_kind(doc, dict, flags);
    // 数组内直接内嵌的字典没有对象 ID，无法按 ID 改写；实际表单中字段都是引用
    if let Some(id) = id {
        out.insert(name, (id, kind));
    } else {
        warn!("⚠️ 字段 '{}' 不是引用对象，无法写入", name);
    }
    Ok(())
}

fn field_name(doc: &Document, dict: &Dictionary) -> Option<String> {
    let obj = dict.get(b"T").ok()?;
    match resolve(doc, obj).ok()? {
        Object::String(bytes, _) => Some(String::from_utf8_lossy(bytes).into_owned()),
        Object::Name(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        _ => None,
    }
}

fn join_name(prefix: Option<&str>, partial: Option<&str>) -> Option<String> {
    match (prefix, partial) {
        (Some(p), Some(t)) => Some(format!("{}.{}", p, t)),
        (None, Some(t)) => Some(t.to_string()),
        (Some(p), None) => Some(p.to_string()),
        (None, None) => None,
    }
}

fn field_kids(doc: &Document, dict: &Dictionary) -> Option<Vec<Object>> {
    let kids = dict.get(b"Kids").ok()?;
    let kids = resolve(doc, kids).ok()?.as_array().ok()?;
    if kids.is_empty() {
        None
    } else {
        Some(kids.clone())
    }
}

fn kids_are_fields(doc: &Document, kids: &[Object]) -> bool {
    kids.iter().any(|kid| {
        resolve(doc, kid)
            .and_then(Object::as_dict)
            .map(|d| d.has(b"T"))
            .unwrap_or(false)
    })
}

fn field_flags(doc: &Document, dict: &Dictionary) -> i64 {
    dict.get(b"Ff")
        .ok()
        .and_then(|o| resolve(doc, o).ok())
        .and_then(|o| o.as_i64().ok())
        .unwrap_or(0)
}

fn field_kind(doc: &Document, dict: &Dictionary, flags: i64) -> RawFieldKind {
    let ft = dict
        .get(b"FT")
        .ok()
        .and_then(|o| resolve(doc, o).ok())
        .and_then(|o| o.as_name().ok());
    match ft {
        Some(b"Tx") => RawFieldKind::Text,
        Some(b"Ch") => RawFieldKind::Choice,
        Some(b"Sig") => RawFieldKind::Signature,
        Some(b"Btn") => {
            if flags & FF_PUSHBUTTON != 0 {
                RawFieldKind::PushButton
            } else {
                // 单选组和复选框都有固定的允许值集合
                RawFieldKind::Button
            }
        }
        _ => RawFieldKind::Other,
    }
}

fn field_options(doc: &Document, dict: &Dictionary) -> Vec<String> {
    let Some(opt) = dict
        .get(b"Opt")
        .ok()
        .and_then(|o| resolve(doc, o).ok())
        .and_then(|o| o.as_array().ok())
    else {
        return Vec::new();
    };
    opt.iter()
        .filter_map(|entry| match resolve(doc, entry).ok()? {
            Object::String(bytes, _) => Some(String::from_utf8_lossy(bytes).into_owned()),
            // [导出值, 显示值] 取导出值
            Object::Array(pair) => match pair.first().and_then(|o| resolve(doc, o).ok())? {
                Object::String(bytes, _) => Some(String::from_utf8_lossy(bytes).into_owned()),
                _ => None,
            },
            _ => None,
        })
        .collect()
}

fn field_rect(doc: &Document, dict: &Dictionary) -> Option<[f32; 4]> {
    let rect = dict
        .get(b"Rect")
        .ok()
        .and_then(|o| resolve(doc, o).ok())
        .and_then(|o| o.as_array().ok())?;
    if rect.len() != 4 {
        return None;
    }
    let mut out = [0.0f32; 4];
    for (i, obj) in rect.iter().enumerate() {
        out[i] = match resolve(doc, obj).ok()? {
            Object::Integer(v) => *v as f32,
            Object::Real(v) => *v as f32,
            _ => return None,
        };
    }
    Some(out)
}

/// 让阅读器重新生成字段外观，否则写入的值不可见
fn set_need_appearances(doc: &mut Document) {
    let acro_id = doc
        .catalog()
        .ok()
        .and_then(|c| c.get(b"AcroForm").ok())
        .and_then(|o| o.as_reference().ok());
    if let Some(id) = acro_id {
        if let Ok(dict) = doc.get_object_mut(id).and_then(Object::as_dict_mut) {
            dict.set("NeedAppearances", true);
        }
    }
}
