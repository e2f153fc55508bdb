use axum::http::HeaderMap;

/// Where a request came from, as reported by the hosting platform's
/// geolocation headers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestHints {
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
}

impl RequestHints {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let get = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        Self {
            latitude: get("x-vercel-ip-latitude"),
            longitude: get("x-vercel-ip-longitude"),
            city: get("x-vercel-ip-city").map(|c| percent_decode(&c)),
            country: get("x-vercel-ip-country"),
        }
    }

    pub fn render(value: &Option<String>) -> &str {
        value.as_deref().unwrap_or("undefined")
    }
}

/// Decode `%XX` escapes. Invalid escapes are kept verbatim.
fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_val(bytes[i + 1]), hex_val(bytes[i + 2])) {
                out.push(hi << 4 | lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_val(b: u8) -> Option<u8> {
    (b as char).to_digit(16).map(|d| d as u8)
}
