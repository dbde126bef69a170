//! Parsing of CAS 2.0 `<cas:serviceResponse>` documents.
//!
//! Elements are matched by local name so the `cas:` prefix (or its absence)
//! does not matter.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::CasError;

/// Answer to `/serviceValidate` or `/proxyValidate`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TicketValidation {
    Success {
        username: String,
        pgt_iou: Option<String>,
        /// Proxies the ticket passed through, most recent first.
        proxies: Vec<String>,
    },
    Failure {
        code: String,
        message: String,
    },
}

/// Answer to `/proxy`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyResponse {
    Success { ticket: String },
    Failure { code: String, message: String },
}

pub fn parse_validation(xml: &str) -> Result<TicketValidation, CasError> {
    let doc = Document::read(xml)?;
    match doc.outcome.as_str() {
        "authenticationSuccess" => Ok(TicketValidation::Success {
            username: doc
                .first("user")
                .ok_or_else(|| CasError::malformed("authenticationSuccess without a user"))?,
            pgt_iou: doc.first("proxyGrantingTicket"),
            proxies: doc.all("proxy"),
        }),
        "authenticationFailure" => Ok(TicketValidation::Failure {
            message: doc.first("authenticationFailure").unwrap_or_default(),
            code: doc.code,
        }),
        other => Err(CasError::malformed(format!("unexpected <{other}> in validation response"))),
    }
}

pub fn parse_proxy(xml: &str) -> Result<ProxyResponse, CasError> {
    let doc = Document::read(xml)?;
    match doc.outcome.as_str() {
        "proxySuccess" => Ok(ProxyResponse::Success {
            ticket: doc
                .first("proxyTicket")
                .ok_or_else(|| CasError::malformed("proxySuccess without a proxyTicket"))?,
        }),
        "proxyFailure" => Ok(ProxyResponse::Failure {
            message: doc.first("proxyFailure").unwrap_or_default(),
            code: doc.code,
        }),
        other => Err(CasError::malformed(format!("unexpected <{other}> in proxy response"))),
    }
}

/// Flattened view of a `serviceResponse`.
#[derive(Debug, Default)]
struct Document {
    /// Local name of the single child of `serviceResponse`.
    outcome: String,
    /// `code` attribute of that child, if any.
    code: String,
    /// `(element, text)` for every text node, in document order.
    texts: Vec<(String, String)>,
}

impl Document {
    fn read(xml: &str) -> Result<Self, CasError> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut doc = Document::default();
        let mut stack: Vec<String> = Vec::new();
        let mut seen_root = false;

        loop {
            match reader.read_event().map_err(CasError::malformed)? {
                Event::Start(e) => {
                    let name = local_name(&e);
                    doc.enter(&stack, &name, &e, &mut seen_root)?;
                    stack.push(name);
                }
                Event::Empty(e) => {
                    let name = local_name(&e);
                    doc.enter(&stack, &name, &e, &mut seen_root)?;
                }
                Event::Text(t) => {
                    let text = t.unescape().map_err(CasError::malformed)?;
                    if let Some(current) = stack.last() {
                        doc.texts.push((current.clone(), text.trim().to_string()));
                    }
                }
                Event::CData(c) => {
                    let text = String::from_utf8_lossy(&c).trim().to_string();
                    if let Some(current) = stack.last() {
                        doc.texts.push((current.clone(), text));
                    }
                }
                Event::End(_) => {
                    stack.pop();
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !seen_root {
            return Err(CasError::malformed("missing serviceResponse element"));
        }
        if doc.outcome.is_empty() {
            return Err(CasError::malformed("empty serviceResponse"));
        }
        Ok(doc)
    }

    fn enter(&mut self, stack: &[String], name: &str, e: &BytesStart<'_>, seen_root: &mut bool) -> Result<(), CasError> {
        match stack.len() {
            0 if name == "serviceResponse" => *seen_root = true,
            0 => return Err(CasError::malformed(format!("unexpected root <{name}>"))),
            1 if self.outcome.is_empty() => {
                self.outcome = name.to_string();
                if let Some(code) = e.try_get_attribute("code").map_err(CasError::malformed)? {
                    self.code = code.unescape_value().map_err(CasError::malformed)?.trim().to_string();
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn first(&self, element: &str) -> Option<String> {
        self.texts
            .iter()
            .find(|(name, text)| name == element && !text.is_empty())
            .map(|(_, text)| text.clone())
    }

    fn all(&self, element: &str) -> Vec<String> {
        self.texts
            .iter()
            .filter(|(name, text)| name == element && !text.is_empty())
            .map(|(_, text)| text.clone())
            .collect()
    }
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}
