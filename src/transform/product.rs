use crate::transform::{OutputRecord, RecordTransform};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Column schema produced by [`ProductTransform`]
pub const PRODUCT_COLUMNS: &[&str] = &[
    "id",
    "slug",
    "title",
    "description",
    "price",
    "category_level1",
    "category_level2",
    "category_level3",
    "image_urls",
    "main_image",
    "created_at",
    "updated_at",
    "digest",
    "link",
];

const SLUG_MAX_CHARS: usize = 100;
const DIGEST_HEX_CHARS: usize = 32;
const DATETIME_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// Product-detail payloads to catalogue rows
#[derive(Debug, Clone)]
pub struct ProductTransform {
    link_prefix: String,
}

impl ProductTransform {
    /// Creates a transform whose `link` column is `<link_prefix>/<id>.html`
    pub fn new(link_prefix: impl Into<String>) -> Self {
        Self {
            link_prefix: link_prefix.into().trim_end_matches('/').to_string(),
        }
    }

    /// Derives the link prefix from the API endpoint's origin
    pub fn for_api(base_url: &url::Url) -> Self {
        let origin = base_url.origin().ascii_serialization();
        Self::new(format!("{}/product_details", origin))
    }
}

impl RecordTransform for ProductTransform {
    fn headers(&self) -> &[&'static str] {
        PRODUCT_COLUMNS
    }

    fn identifier(&self, id: u64, payload: &Value) -> String {
        match payload.get("id") {
            Some(value) if !value.is_null() => scalar(value),
            _ => id.to_string(),
        }
    }

    fn transform(&self, id: u64, payload: &Value) -> OutputRecord {
        let identifier = self.identifier(id, payload);
        let name = text(payload, "name");

        let main_image = text(payload, "thumbnail");
        let pictures: Vec<String> = payload
            .get("picture")
            .or_else(|| payload.get("pictures"))
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let mut images = pictures.clone();
        if images.is_empty() && !main_image.is_empty() {
            images.push(main_image.clone());
        }
        let image_urls = serde_json::to_string(&images).unwrap_or_else(|_| "[]".to_string());
        let main_image = if main_image.is_empty() {
            pictures.first().cloned().unwrap_or_default()
        } else {
            main_image
        };

        let description = ["long_desc", "short_desc", "seo_description"]
            .iter()
            .map(|key| text(payload, key))
            .find(|s| !s.is_empty())
            .unwrap_or_else(|| name.clone());

        let price = ["special_price", "originalPrice", "price"]
            .iter()
            .find_map(|key| payload.get(*key).filter(|v| !v.is_null()))
            .map(scalar)
            .unwrap_or_else(|| "0".to_string());

        let (level1, level2, level3) = parse_category(&text(payload, "category"));

        let fields = vec![
            identifier.clone(),
            slugify(&name, &identifier),
            name.clone(),
            description,
            price.clone(),
            level1,
            level2,
            level3,
            image_urls,
            main_image,
            format_datetime(&text(payload, "created_at")),
            format_datetime(&text(payload, "updated_at")),
            digest(&identifier, &name, &price),
            format!("{}/{}.html", self.link_prefix, identifier),
        ];

        OutputRecord { identifier, fields }
    }
}

/// Renders a JSON scalar without string quoting
fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn text(payload: &Value, key: &str) -> String {
    payload.get(key).map(scalar).unwrap_or_default()
}

/// Lowercase, dash-separated, suffixed with the identifier
fn slugify(name: &str, identifier: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.to_lowercase().chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else if c.is_whitespace() || c == '-' || c == '_' {
            pending_dash = true;
        }
    }

    let full = if slug.is_empty() {
        identifier.to_string()
    } else {
        format!("{}-{}", slug, identifier)
    };
    full.chars().take(SLUG_MAX_CHARS).collect()
}

/// Upstream categories are mostly numeric ("2/163"); only named parts are kept
fn parse_category(category: &str) -> (String, String, String) {
    let mut named = category
        .split('/')
        .map(str::trim)
        .filter(|part| !part.is_empty() && !part.chars().all(|c| c.is_ascii_digit()))
        .map(title_case);

    let level1 = named.next().unwrap_or_else(|| "Fashion".to_string());
    let level2 = named.next().unwrap_or_else(|| "Products".to_string());
    let level3 = named.next().unwrap_or_default();
    (level1, level2, level3)
}

fn title_case(word: &str) -> String {
    let mut out = String::with_capacity(word.len());
    let mut start = true;
    for c in word.chars() {
        if c.is_alphabetic() {
            if start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            start = false;
        } else {
            out.push(c);
            start = true;
        }
    }
    out
}

/// Formats an upstream timestamp as `DD/MM/YYYY HH:MM:SS`, defaulting to now
fn format_datetime(raw: &str) -> String {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.format(DATETIME_FORMAT).to_string();
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return dt.format(DATETIME_FORMAT).to_string();
        }
    }
    Utc::now().format(DATETIME_FORMAT).to_string()
}

fn digest(identifier: &str, name: &str, price: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(identifier.as_bytes());
    hasher.update(name.as_bytes());
    hasher.update(price.as_bytes());
    let mut hex = hex::encode(hasher.finalize());
    hex.truncate(DIGEST_HEX_CHARS);
    hex
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn transform() -> ProductTransform {
        ProductTransform::new("https://shop.example/product_details/")
    }

    fn column<'a>(record: &'a OutputRecord, name: &str) -> &'a str {
        let idx = PRODUCT_COLUMNS.iter().position(|c| *c == name).unwrap();
        &record.fields[idx]
    }

    #[test]
    fn test_full_payload() {
        let payload = json!({
            "id": 1042,
            "name": "Linen Shirt, Slim_Fit!",
            "long_desc": "",
            "short_desc": "A shirt",
            "special_price": 19.5,
            "price": 30,
            "category": "2/163/shirts",
            "thumbnail": "https://img/1.jpg",
            "picture": ["https://img/a.jpg", "", "https://img/b.jpg"],
            "created_at": "2024-03-05T14:07:09Z",
            "updated_at": "2024-03-06 08:00:00"
        });
        let record = transform().transform(1042, &payload);

        assert_eq!(record.identifier, "1042");
        assert_eq!(record.fields.len(), PRODUCT_COLUMNS.len());
        assert_eq!(column(&record, "slug"), "linen-shirt-slim-fit-1042");
        assert_eq!(column(&record, "description"), "A shirt");
        assert_eq!(column(&record, "price"), "19.5");
        assert_eq!(column(&record, "category_level1"), "Shirts");
        assert_eq!(column(&record, "category_level2"), "Products");
        assert_eq!(
            column(&record, "image_urls"),
            r#"["https://img/a.jpg","https://img/b.jpg"]"#
        );
        assert_eq!(column(&record, "main_image"), "https://img/1.jpg");
        assert_eq!(column(&record, "created_at"), "05/03/2024 14:07:09");
        assert_eq!(column(&record, "updated_at"), "06/03/2024 08:00:00");
        assert_eq!(column(&record, "digest").len(), 32);
        assert_eq!(
            column(&record, "link"),
            "https://shop.example/product_details/1042.html"
        );
    }

    #[test]
    fn test_sparse_payload_uses_fallbacks() {
        let record = transform().transform(7, &json!({"name": "Cap"}));
        assert_eq!(record.identifier, "7");
        assert_eq!(column(&record, "description"), "Cap");
        assert_eq!(column(&record, "price"), "0");
        assert_eq!(column(&record, "category_level1"), "Fashion");
        assert_eq!(column(&record, "image_urls"), "[]");
        assert_eq!(column(&record, "main_image"), "");
        assert_eq!(column(&record, "created_at").len(), 19);
    }

    #[test]
    fn test_main_image_falls_back_to_first_picture() {
        let record = transform().transform(3, &json!({"pictures": ["p1", "p2"]}));
        assert_eq!(column(&record, "main_image"), "p1");
    }

    #[test]
    fn test_identifier_prefers_payload_id() {
        let t = transform();
        assert_eq!(t.identifier(5, &json!({"id": "abc"})), "abc");
        assert_eq!(t.identifier(5, &json!({"id": null})), "5");
        assert_eq!(t.identifier(5, &json!({})), "5");
    }

    #[test]
    fn test_slug_is_truncated() {
        let long = "word ".repeat(40);
        assert_eq!(slugify(&long, "1").chars().count(), SLUG_MAX_CHARS);
        assert_eq!(slugify("!!!", "9"), "9");
    }

    #[test]
    fn test_link_prefix_from_api_origin() {
        let base = url::Url::parse("https://api.shop.example:8443/v1/info?x=1").unwrap();
        let t = ProductTransform::for_api(&base);
        let record = t.transform(12, &json!({}));
        assert_eq!(
            column(&record, "link"),
            "https://api.shop.example:8443/product_details/12.html"
        );
    }
}
