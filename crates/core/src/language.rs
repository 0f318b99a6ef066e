//! Language hint for localizing replies. Closed set, deterministic English
//! fallback when detection is inconclusive.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    Vi,
    En,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Vi => "vi",
            Self::En => "en",
        }
    }
}

const VIETNAMESE_MARKERS: &[&str] = &[
    "tôi", "bạn", "muốn", "vé", "sự kiện", "đặt", "xác nhận", "không", "xin chào", "cảm ơn",
    "hủy", "làm lại", "rảnh", "tuần",
];

fn has_vietnamese_diacritics(text: &str) -> bool {
    text.chars().any(|c| {
        matches!(
            c,
            'ă' | 'â' | 'đ' | 'ê' | 'ô' | 'ơ' | 'ư'
                | 'á' | 'à' | 'ả' | 'ã' | 'ạ'
                | 'é' | 'è' | 'ẻ' | 'ẽ' | 'ẹ'
                | 'í' | 'ì' | 'ỉ' | 'ĩ' | 'ị'
                | 'ó' | 'ò' | 'ỏ' | 'õ' | 'ọ'
                | 'ú' | 'ù' | 'ủ' | 'ũ' | 'ụ'
                | 'ý' | 'ỳ' | 'ỷ' | 'ỹ' | 'ỵ'
        )
    })
}

pub fn detect_language(text: &str) -> Language {
    let normalized = text.to_lowercase();
    if has_vietnamese_diacritics(&normalized)
        || VIETNAMESE_MARKERS.iter().any(|marker| normalized.contains(marker))
    {
        return Language::Vi;
    }
    Language::En
}
