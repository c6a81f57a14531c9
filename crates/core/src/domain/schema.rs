//! Order field schema.
//!
//! The schema is the fixed, ordered list of fields a stamp/seal order is made
//! of. Order matters: summaries list fields in this order and persisted rows
//! lay their columns out in this order, regardless of which fields a given
//! order actually filled.

use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct FieldDefinition {
    /// Stable identifier used by the extractor and in persisted records.
    pub key: &'static str,
    /// Question shown to the customer; also the summary label and column header.
    pub prompt: &'static str,
    /// What the extraction model should put into this field.
    pub hint: &'static str,
}

pub const ORDER_FIELDS: &[FieldDefinition] = &[
    FieldDefinition { key: "name", prompt: "Как вас зовут?", hint: "имя заказчика" },
    FieldDefinition { key: "phone", prompt: "Ваш номер телефона?", hint: "номер телефона" },
    FieldDefinition {
        key: "productType",
        prompt: "Что нужно — печать или штамп?",
        hint: "\"печать\" или \"штамп\"",
    },
    FieldDefinition {
        key: "usage",
        prompt: "Для кого будет использоваться?",
        hint: "для кого (например, ИП, ООО)",
    },
    FieldDefinition {
        key: "textOnStamp",
        prompt: "Что должно быть написано?",
        hint: "что должно быть написано",
    },
    FieldDefinition {
        key: "size",
        prompt: "Размер изделия?",
        hint: "размер (например, диаметр 40мм)",
    },
    FieldDefinition {
        key: "language",
        prompt: "Язык текста?",
        hint: "язык текста (русский, английский, оба)",
    },
    FieldDefinition {
        key: "logo",
        prompt: "Добавить логотип или изображение?",
        hint: "добавить логотип или нет (да/нет)",
    },
    FieldDefinition { key: "color", prompt: "Цвет оттиска?", hint: "цвет оттиска" },
    FieldDefinition {
        key: "osnastkaCategory",
        prompt: "Категория оснастки?",
        hint: "категория оснастки (автоматическая, ручная, карманная)",
    },
    FieldDefinition {
        key: "osnastkaModel",
        prompt: "Модель оснастки?",
        hint: "модель оснастки (например, \"Офис\", \"Тродант\")",
    },
    FieldDefinition { key: "quantity", prompt: "Количество штук?", hint: "количество штук" },
    FieldDefinition {
        key: "urgency",
        prompt: "Срочность, доставка, пожелания?",
        hint: "срочность, доставка, пожелания",
    },
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldSchema {
    fields: &'static [FieldDefinition],
}

impl Default for FieldSchema {
    fn default() -> Self {
        Self::order()
    }
}

impl FieldSchema {
    pub const fn new(fields: &'static [FieldDefinition]) -> Self {
        Self { fields }
    }

    /// The stamp/seal order schema.
    pub const fn order() -> Self {
        Self::new(ORDER_FIELDS)
    }

    pub fn fields(&self) -> &'static [FieldDefinition] {
        self.fields
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> {
        self.fields.iter().map(|field| field.key)
    }

    pub fn prompts(&self) -> impl Iterator<Item = &'static str> {
        self.fields.iter().map(|field| field.prompt)
    }

    pub fn field(&self, key: &str) -> Option<&'static FieldDefinition> {
        self.fields.iter().find(|field| field.key == key)
    }

    pub fn is_known(&self, key: &str) -> bool {
        self.field(key).is_some()
    }

    pub fn prompt(&self, key: &str) -> Option<&'static str> {
        self.field(key).map(|field| field.prompt)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
