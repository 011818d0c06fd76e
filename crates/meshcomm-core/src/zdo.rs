//! Match-descriptor request/response frames.
//!
//! A match-descriptor request asks every device covered by a broadcast
//! address whether it hosts an endpoint with the given profile and cluster
//! set. Each matching device answers with the list of matching endpoints.

use alloc::vec::Vec;

use crate::constants::{MATCH_DESC_RSP_HEADER_SIZE, ZDP_STATUS_SUCCESS};
use crate::error::{CodecError, PayloadError};
use crate::types::{ClusterId, Endpoint, ProfileId, ShortAddr};

/// Outgoing capability query.
///
/// Layout: `nwk_addr(2) addr_of_interest(2) profile(2) num_in(1) in(2n) num_out(1) out(2m)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchDescRequest {
    /// Where the request is sent (usually a broadcast address).
    pub nwk_addr: ShortAddr,
    /// Which devices should answer.
    pub addr_of_interest: ShortAddr,
    pub profile: ProfileId,
    pub in_clusters: Vec<ClusterId>,
    pub out_clusters: Vec<ClusterId>,
}

impl MatchDescRequest {
    /// Query for server-side (input) clusters only.
    pub fn servers(target: ShortAddr, profile: ProfileId, clusters: &[ClusterId]) -> Self {
        Self {
            nwk_addr: target,
            addr_of_interest: target,
            profile,
            in_clusters: clusters.to_vec(),
            out_clusters: Vec::new(),
        }
    }

    pub fn encoded_len(&self) -> usize {
        6 + 1 + 2 * self.in_clusters.len() + 1 + 2 * self.out_clusters.len()
    }

    /// Write the request into `out`, returning the number of bytes written.
    pub fn encode_into(&self, out: &mut [u8]) -> Result<usize, CodecError> {
        for list in [&self.in_clusters, &self.out_clusters] {
            if list.len() > u8::MAX as usize {
                return Err(CodecError::TooManyClusters(list.len()));
            }
        }
        let needed = self.encoded_len();
        if out.len() < needed {
            return Err(CodecError::BufferTooSmall {
                needed,
                available: out.len(),
            });
        }

        out[0..2].copy_from_slice(&self.nwk_addr.to_le_bytes());
        out[2..4].copy_from_slice(&self.addr_of_interest.to_le_bytes());
        out[4..6].copy_from_slice(&self.profile.get().to_le_bytes());
        let mut pos = 6;
        for list in [&self.in_clusters, &self.out_clusters] {
            out[pos] = list.len() as u8;
            pos += 1;
            for cluster in list.iter() {
                out[pos..pos + 2].copy_from_slice(&cluster.get().to_le_bytes());
                pos += 2;
            }
        }
        Ok(pos)
    }

    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let mut out = alloc::vec![0u8; self.encoded_len()];
        self.encode_into(&mut out)?;
        Ok(out)
    }

    /// Parse a request; used by simulated responders.
    pub fn decode(data: &[u8]) -> Result<Self, PayloadError> {
        let header = data.get(..7).ok_or(PayloadError::TooShort {
            min: 7,
            actual: data.len(),
        })?;
        let nwk_addr = ShortAddr::from_le_bytes([header[0], header[1]]);
        let addr_of_interest = ShortAddr::from_le_bytes([header[2], header[3]]);
        let profile = ProfileId::new(u16::from_le_bytes([header[4], header[5]]));

        let mut pos = 6;
        let in_clusters = read_cluster_list(data, &mut pos)?;
        let out_clusters = read_cluster_list(data, &mut pos)?;

        Ok(Self {
            nwk_addr,
            addr_of_interest,
            profile,
            in_clusters,
            out_clusters,
        })
    }
}

fn read_cluster_list(data: &[u8], pos: &mut usize) -> Result<Vec<ClusterId>, PayloadError> {
    let count = *data.get(*pos).ok_or(PayloadError::TooShort {
        min: *pos + 1,
        actual: data.len(),
    })? as usize;
    *pos += 1;
    let end = *pos + 2 * count;
    let bytes = data.get(*pos..end).ok_or(PayloadError::TooShort {
        min: end,
        actual: data.len(),
    })?;
    *pos = end;
    Ok(bytes
        .chunks_exact(2)
        .map(|c| ClusterId::new(u16::from_le_bytes([c[0], c[1]])))
        .collect())
}

/// Response to a capability query, as delivered through the signal ingress.
///
/// Layout: `src_addr(2) status(1) addr_of_interest(2) match_len(1) endpoints(match_len)`.
/// `src_addr` comes from the data indication the stack received the
/// response in; the remainder is the over-the-air response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchDescResponse {
    pub src_addr: ShortAddr,
    pub status: u8,
    pub addr_of_interest: ShortAddr,
    pub endpoints: Vec<Endpoint>,
}

impl MatchDescResponse {
    pub fn decode(data: &[u8]) -> Result<Self, PayloadError> {
        let header = data
            .get(..MATCH_DESC_RSP_HEADER_SIZE)
            .ok_or(PayloadError::TooShort {
                min: MATCH_DESC_RSP_HEADER_SIZE,
                actual: data.len(),
            })?;
        let declared = header[5] as usize;
        let list = &data[MATCH_DESC_RSP_HEADER_SIZE..];
        if list.len() < declared {
            return Err(PayloadError::MatchListTruncated {
                declared,
                actual: list.len(),
            });
        }

        Ok(Self {
            src_addr: ShortAddr::from_le_bytes([header[0], header[1]]),
            status: header[2],
            addr_of_interest: ShortAddr::from_le_bytes([header[3], header[4]]),
            endpoints: list[..declared].iter().map(|&ep| Endpoint::new(ep)).collect(),
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let count = self.endpoints.len().min(u8::MAX as usize);
        let mut out = Vec::with_capacity(MATCH_DESC_RSP_HEADER_SIZE + count);
        out.extend_from_slice(&self.src_addr.to_le_bytes());
        out.push(self.status);
        out.extend_from_slice(&self.addr_of_interest.to_le_bytes());
        out.push(count as u8);
        out.extend(self.endpoints[..count].iter().map(|ep| ep.get()));
        out
    }

    pub fn is_success(&self) -> bool {
        self.status == ZDP_STATUS_SUCCESS
    }

    /// The endpoint to use when this response is accepted: the first match.
    pub fn first_match(&self) -> Option<Endpoint> {
        if self.is_success() {
            self.endpoints.first().copied()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{
        BROADCAST_RX_ON_WHEN_IDLE, CLUSTER_LEVEL_CONTROL, CLUSTER_ON_OFF, HA_PROFILE_ID,
        ZDP_STATUS_DEVICE_NOT_FOUND,
    };

    fn light_query() -> MatchDescRequest {
        MatchDescRequest::servers(
            BROADCAST_RX_ON_WHEN_IDLE,
            HA_PROFILE_ID,
            &[CLUSTER_ON_OFF, CLUSTER_LEVEL_CONTROL],
        )
    }

    #[test]
    fn request_layout() {
        let bytes = light_query().encode().unwrap();
        assert_eq!(
            bytes,
            alloc::vec![0xFD, 0xFF, 0xFD, 0xFF, 0x04, 0x01, 2, 0x06, 0x00, 0x08, 0x00, 0]
        );
    }

    #[test]
    fn request_into_small_buffer_fails() {
        let mut out = [0u8; 8];
        assert_eq!(
            light_query().encode_into(&mut out),
            Err(CodecError::BufferTooSmall {
                needed: 12,
                available: 8
            })
        );
    }

    #[test]
    fn request_decode_matches_encode() {
        let req = light_query();
        assert_eq!(MatchDescRequest::decode(&req.encode().unwrap()).unwrap(), req);
    }

    #[test]
    fn response_first_match() {
        let rsp = MatchDescResponse {
            src_addr: ShortAddr::new(0x1234),
            status: ZDP_STATUS_SUCCESS,
            addr_of_interest: ShortAddr::new(0x1234),
            endpoints: alloc::vec![Endpoint::new(10), Endpoint::new(11)],
        };
        let decoded = MatchDescResponse::decode(&rsp.encode()).unwrap();
        assert_eq!(decoded.first_match(), Some(Endpoint::new(10)));
        assert_eq!(decoded.src_addr, ShortAddr::new(0x1234));
    }

    #[test]
    fn response_error_status_has_no_match() {
        let rsp = MatchDescResponse {
            src_addr: ShortAddr::new(0x0002),
            status: ZDP_STATUS_DEVICE_NOT_FOUND,
            addr_of_interest: ShortAddr::new(0x0002),
            endpoints: alloc::vec![Endpoint::new(1)],
        };
        assert_eq!(rsp.first_match(), None);
    }

    #[test]
    fn response_zero_matches() {
        let data = [0x34, 0x12, 0x00, 0x34, 0x12, 0x00];
        let rsp = MatchDescResponse::decode(&data).unwrap();
        assert!(rsp.is_success());
        assert_eq!(rsp.first_match(), None);
    }

    #[test]
    fn response_truncated_list() {
        let data = [0x34, 0x12, 0x00, 0x34, 0x12, 0x03, 0x0A];
        assert_eq!(
            MatchDescResponse::decode(&data),
            Err(PayloadError::MatchListTruncated {
                declared: 3,
                actual: 1
            })
        );
    }
}
