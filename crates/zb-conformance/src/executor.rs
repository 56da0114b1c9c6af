#![forbid(unsafe_code)]

//! Dual request execution: the same logical operation sent once through
//! the mediation proxy and once directly upstream. The two legs are
//! independent; either may fail without suppressing the other, so the
//! assertion engine can compare failure shapes too.

use zb_wire::{
    DirectRequest, MediatedRequest, Transport, TransportError, WireRequest, WireResponse,
};

/// Both legs' outcomes for one case. Held only for the duration of that
/// case's evaluation.
#[derive(Debug, Clone)]
pub struct DualResponse {
    pub mediated: Result<WireResponse, TransportError>,
    pub direct: Result<WireResponse, TransportError>,
}

pub struct DualExecutor<'a, T: Transport + ?Sized> {
    transport: &'a T,
}

impl<'a, T: Transport + ?Sized> DualExecutor<'a, T> {
    #[must_use]
    pub fn new(transport: &'a T) -> Self {
        Self { transport }
    }

    pub fn send_mediated(&self, request: &MediatedRequest) -> Result<WireResponse, TransportError> {
        let wire = WireRequest::Mediated(request.clone());
        let result = self.transport.send(&wire);
        if let Err(err) = &result {
            log::warn!("{} failed: {err}", wire.describe());
        }
        result
    }

    pub fn send_direct(&self, request: &DirectRequest) -> Result<WireResponse, TransportError> {
        let wire = WireRequest::Direct(request.clone());
        let result = self.transport.send(&wire);
        if let Err(err) = &result {
            log::warn!("{} failed: {err}", wire.describe());
        }
        result
    }

    /// Fires both prebuilt legs and captures both outcomes. Used when the
    /// direct leg does not depend on values from the mediated response.
    pub fn execute(&self, mediated: &MediatedRequest, direct: &DirectRequest) -> DualResponse {
        DualResponse {
            mediated: self.send_mediated(mediated),
            direct: self.send_direct(direct),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use zb_wire::{Endpoints, HttpMethod};

    /// Fails the mediated leg, answers the direct leg.
    struct HalfBrokenTransport;

    impl Transport for HalfBrokenTransport {
        fn send(&self, request: &WireRequest) -> Result<WireResponse, TransportError> {
            match request {
                WireRequest::Mediated(_) => Err(TransportError::Timeout),
                WireRequest::Direct(_) => Ok(WireResponse {
                    status: 200,
                    body: json!({"items": []}),
                }),
            }
        }
    }

    #[test]
    fn one_failed_leg_does_not_suppress_the_other() {
        let endpoints = Endpoints {
            proxy_url: "http://proxy".to_string(),
            api_base_url: "http://api".to_string(),
            auth_token: "t".to_string(),
            organization_id: "o".to_string(),
        };
        let mediated = MediatedRequest::new(&endpoints, "listItems", json!({}));
        let direct = DirectRequest::new(&endpoints, HttpMethod::Get, "items", Vec::new());

        let executor = DualExecutor::new(&HalfBrokenTransport);
        let dual = executor.execute(&mediated, &direct);

        assert_eq!(dual.mediated.unwrap_err(), TransportError::Timeout);
        assert_eq!(dual.direct.unwrap().status, 200);
    }
}
