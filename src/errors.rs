// Pulled out of lib.rs into its own file because this crate's error
// taxonomy has grown a few more variants than a one-liner deserves.

error_chain! {
    errors {
        /// The election observed a condition the protocol guarantees
        /// should be impossible: an out-of-range state counter, a leader
        /// adopting a log position behind its own, or similar. Fatal to
        /// this election instance.
        ProtocolViolation(msg: String) {
            description("election protocol violation")
            display("election protocol violation: {}", msg)
        }

        /// The agent reported that replaying the leader's archived log
        /// range towards the catch-up target can not make further
        /// progress. The caller decides whether to retry with a fresh
        /// election; this crate treats it as fatal to the current one.
        CatchupFailed(msg: String) {
            description("log catch-up failed")
            display("log catch-up failed: {}", msg)
        }
    }
}
