//! Protobuf frames of the long connection.

use std::time::Duration;

use prost::Message;
use serde_json::json;

/// `method` of control frames (ping / pong).
pub const METHOD_CONTROL: i32 = 0;
/// `method` of data frames (events / card callbacks).
pub const METHOD_DATA: i32 = 1;

pub const HEADER_TYPE: &str = "type";
pub const HEADER_MESSAGE_ID: &str = "message_id";
pub const HEADER_SUM: &str = "sum";
pub const HEADER_SEQ: &str = "seq";
pub const HEADER_BIZ_RT: &str = "biz_rt";

#[derive(Clone, PartialEq, Message)]
pub struct Header {
    #[prost(string, required, tag = "1")]
    pub key: String,
    #[prost(string, required, tag = "2")]
    pub value: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct Frame {
    #[prost(uint64, required, tag = "1")]
    pub seq_id: u64,
    #[prost(uint64, required, tag = "2")]
    pub log_id: u64,
    #[prost(int32, required, tag = "3")]
    pub service: i32,
    #[prost(int32, required, tag = "4")]
    pub method: i32,
    #[prost(message, repeated, tag = "5")]
    pub headers: Vec<Header>,
    #[prost(string, optional, tag = "6")]
    pub payload_encoding: Option<String>,
    #[prost(string, optional, tag = "7")]
    pub payload_type: Option<String>,
    #[prost(bytes = "vec", optional, tag = "8")]
    pub payload: Option<Vec<u8>>,
    #[prost(string, optional, tag = "9")]
    pub log_id_new: Option<String>,
}

impl Frame {
    /// A client ping for `service_id`.
    pub fn ping(service_id: i32) -> Self {
        Self {
            service: service_id,
            method: METHOD_CONTROL,
            headers: vec![Header {
                key: HEADER_TYPE.to_string(),
                value: "ping".to_string(),
            }],
            ..Default::default()
        }
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.iter().find(|h| h.key == key).map(|h| h.value.as_str())
    }

    pub fn header_usize(&self, key: &str) -> Option<usize> {
        self.header(key).and_then(|v| v.parse().ok())
    }

    /// Turns a received data frame into the acknowledgement the server expects.
    pub fn into_response(mut self, code: u16, elapsed: Duration) -> Self {
        self.headers.push(Header {
            key: HEADER_BIZ_RT.to_string(),
            value: elapsed.as_millis().to_string(),
        });
        self.payload = Some(json!({ "code": code, "headers": null, "data": null }).to_string().into_bytes());
        self
    }
}
