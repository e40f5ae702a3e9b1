//! 属性目录
//!
//! 定位规则可引用的输入维度。每个属性有固定的名称和类型，
//! 类型决定了条件上可用的操作符集合。

use crate::error::{Result, RuleError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// 属性类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeType {
    String,
    Number,
    Date,
    Object,
}

impl AttributeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Date => "date",
            Self::Object => "object",
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 属性定义
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    #[serde(rename = "type")]
    pub attribute_type: AttributeType,
    #[serde(default)]
    pub description: String,
}

impl Attribute {
    pub fn new(
        name: impl Into<String>,
        attribute_type: AttributeType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            attribute_type,
            description: description.into(),
        }
    }
}

/// 属性目录
///
/// 构建完成后只读，按名称解析。`Default` 提供内置目录。
#[derive(Debug, Clone)]
pub struct AttributeRegistry {
    attributes: HashMap<String, Attribute>,
    /// 注册顺序，供编辑器按固定顺序展示
    order: Vec<String>,
}

impl AttributeRegistry {
    /// 创建空目录
    pub fn empty() -> Self {
        Self {
            attributes: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// 从属性列表构建目录，名称重复时报错
    pub fn from_attributes(attributes: impl IntoIterator<Item = Attribute>) -> Result<Self> {
        let mut registry = Self::empty();
        for attribute in attributes {
            registry.register(attribute)?;
        }
        Ok(registry)
    }

    /// 从 JSON 数组加载目录，如 `[{"name": "country", "type": "string"}]`
    pub fn from_json(json: &str) -> Result<Self> {
        let attributes: Vec<Attribute> = serde_json::from_str(json)?;
        Self::from_attributes(attributes)
    }

    /// 注册属性
    pub fn register(&mut self, attribute: Attribute) -> Result<()> {
        if attribute.name.is_empty() {
            return Err(RuleError::ParseError("属性名称不能为空".to_string()));
        }
        if self.attributes.contains_key(&attribute.name) {
            return Err(RuleError::DuplicateAttribute(attribute.name));
        }

        self.order.push(attribute.name.clone());
        self.attributes.insert(attribute.name.clone(), attribute);
        Ok(())
    }

    /// 按名称解析属性
    pub fn resolve(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    /// 按注册顺序列出全部属性
    pub fn list(&self) -> Vec<&Attribute> {
        self.order
            .iter()
            .filter_map(|name| self.attributes.get(name))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

impl Default for AttributeRegistry {
    fn default() -> Self {
        let builtin = [
            Attribute::new("userId", AttributeType::String, "用户唯一标识"),
            Attribute::new("email", AttributeType::String, "用户邮箱地址"),
            Attribute::new("country", AttributeType::String, "ISO 3166 国家代码，如 BR、US"),
            Attribute::new("userType", AttributeType::String, "用户类型，如 free、premium"),
            Attribute::new("plan", AttributeType::String, "订阅套餐"),
            Attribute::new("platform", AttributeType::String, "客户端平台，如 ios、android、web"),
            Attribute::new("appVersion", AttributeType::String, "客户端版本号"),
            Attribute::new("accountAge", AttributeType::Number, "账号注册天数"),
            Attribute::new("sessionCount", AttributeType::Number, "累计会话次数"),
            Attribute::new("totalSpend", AttributeType::Number, "累计消费金额"),
            Attribute::new("signupDate", AttributeType::Date, "注册时间"),
            Attribute::new("lastLoginDate", AttributeType::Date, "最近登录时间"),
            Attribute::new("metadata", AttributeType::Object, "自定义元数据"),
        ];

        let mut registry = Self::empty();
        for attribute in builtin {
            registry.order.push(attribute.name.clone());
            registry.attributes.insert(attribute.name.clone(), attribute);
        }
        registry
    }
}
