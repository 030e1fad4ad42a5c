use call_signal::{IceCandidate, Role, SessionDescription};
use log::info;

const MEDIA_LINES: [&str; 2] = ["audio", "video"];

/// Stand-in for a native media engine: produces plausible `SDP` and host candidates
/// and logs whatever the remote side sends.
#[derive(Debug)]
pub struct FakeMediaEngine {
    role: Role,
    session_id: u64,
    remote_description: Option<SessionDescription>,
    remote_candidates: Vec<IceCandidate>,
}

impl FakeMediaEngine {
    pub fn new(role: Role) -> Self {
        let session_id = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_secs());
        Self {
            role,
            session_id,
            remote_description: None,
            remote_candidates: Vec::new(),
        }
    }

    fn sdp(&self) -> String {
        let mut sdp = format!(
            "v=0\r\no=- {} 2 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\na=group:BUNDLE 0 1\r\n",
            self.session_id
        );
        for (index, kind) in MEDIA_LINES.iter().enumerate() {
            let port = 9 + index;
            sdp.push_str(&format!(
                "m={kind} {port} UDP/TLS/RTP/SAVPF 111\r\na=mid:{index}\r\na=sendrecv\r\n"
            ));
        }
        sdp
    }

    pub fn create_offer(&self) -> SessionDescription {
        SessionDescription::offer(self.sdp())
    }

    pub fn create_answer(&self) -> SessionDescription {
        SessionDescription::answer(self.sdp())
    }

    /// One host candidate per media line.
    pub fn gather_candidates(&self) -> Vec<IceCandidate> {
        let base_port: u32 = match self.role {
            Role::Phone => 50_000,
            Role::Dispatcher => 51_000,
        };
        (0_u32..)
            .zip(MEDIA_LINES)
            .map(|(index, kind)| {
                IceCandidate::new(
                    index,
                    kind,
                    format!(
                        "candidate:{index} 1 udp 2122260223 127.0.0.1 {} typ host",
                        base_port + index
                    ),
                )
            })
            .collect()
    }

    pub fn set_remote_description(&mut self, description: &SessionDescription) {
        info!(
            "media: remote {:?} applied ({} bytes of sdp)",
            description.sdp_type,
            description.sdp.len()
        );
        self.remote_description = Some(description.clone());
    }

    pub fn add_remote_candidate(&mut self, candidate: &IceCandidate) {
        info!(
            "media: remote {:?} candidate on m-line {}: {}",
            candidate.id, candidate.label, candidate.candidate
        );
        self.remote_candidates.push(candidate.clone());
    }

    /// Whether there is enough remote state to attempt connectivity checks.
    pub fn is_negotiated(&self) -> bool {
        self.remote_description.is_some() && !self.remote_candidates.is_empty()
    }
}
