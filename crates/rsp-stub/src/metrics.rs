//! Metric names recorded by the dispatcher.

use metrics::{Unit, describe_counter};

pub const PACKETS_RECEIVED: &str = "rsp_packets_received_total";
pub const PACKET_ERRORS: &str = "rsp_packet_errors_total";
pub const REPLIES_REJECTED: &str = "rsp_replies_rejected_total";
pub const ERROR_REPLIES: &str = "rsp_error_replies_total";
pub const MEMORY_READ_BYTES: &str = "rsp_memory_read_bytes_total";
pub const MEMORY_WRITTEN_BYTES: &str = "rsp_memory_written_bytes_total";
pub const RESUMES: &str = "rsp_resumes_total";

/// Register metric descriptions with the installed recorder.
pub fn describe() {
    describe_counter!(
        PACKETS_RECEIVED,
        Unit::Count,
        "Packets received with a valid checksum"
    );
    describe_counter!(
        PACKET_ERRORS,
        Unit::Count,
        "Packets dropped for a bad checksum or overflow"
    );
    describe_counter!(
        REPLIES_REJECTED,
        Unit::Count,
        "Replies the host answered with NAK"
    );
    describe_counter!(ERROR_REPLIES, Unit::Count, "Error packets sent, by code");
    describe_counter!(
        MEMORY_READ_BYTES,
        Unit::Bytes,
        "Target memory bytes read for the host"
    );
    describe_counter!(
        MEMORY_WRITTEN_BYTES,
        Unit::Bytes,
        "Target memory bytes written by the host"
    );
    describe_counter!(RESUMES, Unit::Count, "Continue and step requests, by kind");
}
