//! The four outcomes a locally-driven test can finalise to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Display)]
pub enum Reachability {
    /// Bob's and Charlie's views of Alice's endpoint agree: no symmetric
    /// NAT in the way.
    #[display("ok")]
    Ok,
    /// Bob's and Charlie's views disagree: symmetric NAT.
    #[display("different")]
    Different,
    /// Bob's reply arrived but no Charlie ever confirmed: Alice accepts
    /// unsolicited inbound traffic Bob didn't ask her to expect, a firewall
    /// signature.
    #[display("reject-unsolicited")]
    RejectUnsolicited,
    /// Neither Bob nor Charlie confirmed, or the test was aborted before a
    /// verdict could be reached.
    #[display("unknown")]
    Unknown,
}
