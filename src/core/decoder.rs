use crate::core::{BatchRequest, InputRecord};
use crate::utils::error::DecodeError;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Deserialize;

const XML_ROOT: &[u8] = b"users";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchEncoding {
    #[default]
    Xml,
    Json,
}

impl BatchEncoding {
    /// 依 Content-Type 判斷編碼；未宣告或無法辨識時沿用 XML
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        let Some(value) = content_type else {
            return BatchEncoding::Xml;
        };
        let mime = value
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        if mime == "application/json" || mime.ends_with("+json") {
            BatchEncoding::Json
        } else {
            BatchEncoding::Xml
        }
    }
}

/// `<user>` 之間夾雜的其他元素一律略過
#[derive(Debug, Deserialize)]
struct UsersDocument {
    #[serde(rename = "user", default)]
    users: Vec<XmlUser>,
}

/// XML 的 `<age>` 先以文字讀入：空元素視為 0，其餘去除空白後再轉成整數
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct XmlUser {
    id: String,
    name: String,
    email: String,
    age: String,
}

impl TryFrom<XmlUser> for InputRecord {
    type Error = DecodeError;

    fn try_from(user: XmlUser) -> Result<Self, Self::Error> {
        let age = parse_age(&user.age)?;
        Ok(InputRecord {
            id: user.id,
            name: user.name,
            email: user.email,
            age,
        })
    }
}

fn parse_age(raw: &str) -> Result<i64, DecodeError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(0);
    }
    trimmed
        .parse()
        .map_err(|e| DecodeError::InvalidXml(format!("invalid age '{}': {}", trimmed, e)))
}

#[derive(Debug, Deserialize)]
struct UsersPayload {
    users: Vec<InputRecord>,
}

/// 解析整批內容。任何錯誤都不會產生部分的 BatchRequest。
pub fn decode_batch(body: &[u8], encoding: BatchEncoding) -> Result<BatchRequest, DecodeError> {
    match encoding {
        BatchEncoding::Xml => decode_xml(body),
        BatchEncoding::Json => decode_json(body),
    }
}

fn decode_xml(body: &[u8]) -> Result<BatchRequest, DecodeError> {
    let text = std::str::from_utf8(body).map_err(|e| DecodeError::InvalidXml(e.to_string()))?;

    check_root_element(text)?;

    let document: UsersDocument =
        quick_xml::de::from_str(text).map_err(|e| DecodeError::InvalidXml(e.to_string()))?;

    let items = document
        .users
        .into_iter()
        .map(InputRecord::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(BatchRequest::new(items))
}

fn decode_json(body: &[u8]) -> Result<BatchRequest, DecodeError> {
    let payload: UsersPayload = serde_json::from_slice(body)?;
    Ok(BatchRequest::new(payload.users))
}

fn check_root_element(text: &str) -> Result<(), DecodeError> {
    let mut reader = Reader::from_str(text);

    loop {
        match reader.read_event() {
            Ok(Event::Start(element)) | Ok(Event::Empty(element)) => {
                let name = element.name();
                if name.as_ref() == XML_ROOT {
                    return Ok(());
                }
                return Err(DecodeError::UnexpectedRoot {
                    found: String::from_utf8_lossy(name.as_ref()).into_owned(),
                });
            }
            Ok(Event::Eof) => {
                return Err(DecodeError::InvalidXml("document has no root element".to_string()))
            }
            Ok(_) => continue,
            Err(e) => return Err(DecodeError::InvalidXml(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THREE_USERS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<users>
    <user>
        <id>1</id>
        <name>Alice Smith</name>
        <email>alice@example.com</email>
        <age>24</age>
    </user>
    <user>
        <id>2</id>
        <name>Bob Jones</name>
        <email>bob@example.com</email>
        <age>35</age>
    </user>
    <user>
        <id>3</id>
        <name>Carol White</name>
        <email>carol@example.com</email>
        <age>61</age>
    </user>
</users>"#;

    #[test]
    fn test_decode_xml_batch_keeps_document_order() {
        let batch = decode_batch(THREE_USERS.as_bytes(), BatchEncoding::Xml).unwrap();

        assert_eq!(batch.len(), 3);
        assert_eq!(batch.items[0].id, "1");
        assert_eq!(batch.items[0].name, "Alice Smith");
        assert_eq!(batch.items[1].email, "bob@example.com");
        assert_eq!(batch.items[2].age, 61);
    }

    #[test]
    fn test_decode_empty_batch() {
        let batch = decode_batch(b"<users></users>", BatchEncoding::Xml).unwrap();
        assert!(batch.is_empty());

        let batch = decode_batch(b"<users/>", BatchEncoding::Xml).unwrap();
        assert!(batch.is_empty());
    }

    #[test]
    fn test_missing_fields_decode_to_zero_values() {
        let body = b"<users><user><name>No Id</name></user></users>";
        let batch = decode_batch(body, BatchEncoding::Xml).unwrap();

        assert_eq!(batch.len(), 1);
        assert_eq!(batch.items[0].id, "");
        assert_eq!(batch.items[0].age, 0);
    }

    #[test]
    fn test_empty_age_element_decodes_to_zero() {
        let body = b"<users><user><id>1</id><age></age></user><user><id>2</id><age/></user></users>";
        let batch = decode_batch(body, BatchEncoding::Xml).unwrap();

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.items[0].age, 0);
        assert_eq!(batch.items[1].age, 0);

        let body = b"<users><user><id>3</id><age>  </age></user><user><id>4</id><age> 42 </age></user></users>";
        let batch = decode_batch(body, BatchEncoding::Xml).unwrap();
        assert_eq!(batch.items[0].age, 0);
        assert_eq!(batch.items[1].age, 42);
    }

    #[test]
    fn test_unknown_siblings_between_users_are_skipped() {
        let body = b"<users><user><id>1</id></user><meta>x</meta><user><id>2</id></user></users>";
        let batch = decode_batch(body, BatchEncoding::Xml).unwrap();

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.items[0].id, "1");
        assert_eq!(batch.items[1].id, "2");
    }

    #[test]
    fn test_malformed_xml_is_rejected() {
        let err = decode_batch(b"<users><user><id>1</id>", BatchEncoding::Xml).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidXml(_)));

        let err = decode_batch(b"not xml at all", BatchEncoding::Xml).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidXml(_)));
    }

    #[test]
    fn test_wrong_root_is_rejected() {
        let err = decode_batch(b"<people><user><id>1</id></user></people>", BatchEncoding::Xml)
            .unwrap_err();
        assert!(matches!(err, DecodeError::UnexpectedRoot { ref found } if found == "people"));
    }

    #[test]
    fn test_non_numeric_age_is_rejected() {
        let body = b"<users><user><id>1</id><age>forty</age></user></users>";
        let err = decode_batch(body, BatchEncoding::Xml).unwrap_err();
        assert_eq!(err.client_message(), "Invalid XML format");
    }

    #[test]
    fn test_non_utf8_body_is_rejected() {
        let err = decode_batch(&[0xff, 0xfe, 0x3c], BatchEncoding::Xml).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidXml(_)));
    }

    #[test]
    fn test_decode_json_batch() {
        let body = serde_json::json!({
            "users": [
                {"id": "7", "name": "Dan", "email": "dan@example.com", "age": 29},
                {"id": "8", "name": "Eve", "email": "eve@example.com", "age": 52}
            ]
        });
        let batch =
            decode_batch(body.to_string().as_bytes(), BatchEncoding::Json).unwrap();

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.items[1].name, "Eve");

        let err = decode_batch(b"{\"people\": []}", BatchEncoding::Json).unwrap_err();
        assert_eq!(err.client_message(), "Invalid JSON format");
    }

    #[test]
    fn test_encoding_from_content_type() {
        assert_eq!(BatchEncoding::from_content_type(None), BatchEncoding::Xml);
        assert_eq!(
            BatchEncoding::from_content_type(Some("application/xml")),
            BatchEncoding::Xml
        );
        assert_eq!(
            BatchEncoding::from_content_type(Some("application/json; charset=utf-8")),
            BatchEncoding::Json
        );
        assert_eq!(
            BatchEncoding::from_content_type(Some("application/vnd.users+json")),
            BatchEncoding::Json
        );
    }
}
