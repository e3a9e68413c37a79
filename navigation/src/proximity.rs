use std::{fs::File, io::Read, path::Path, sync::Arc};

use crate::{
    geo,
    models::{BoundingBox, Coordinate, ParkingSpot},
    reroute::BoxFuture,
};

#[derive(Debug, thiserror::Error)]
pub enum SpotProviderError {
    #[error("failed to read spot catalogue: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid spot catalogue: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Supplies candidate spots inside a bounding box. The box is only a
/// prefilter; ranking happens in [`find_nearby_spots`].
pub trait SpotProvider: Send + Sync {
    fn query_available_spots(
        &self,
        bbox: BoundingBox,
    ) -> BoxFuture<'_, Result<Vec<ParkingSpot>, SpotProviderError>>;
}

/// Available spots within `radius_m` of `reference`, nearest first, with
/// `distance_from_reference_m` filled in.
pub fn find_nearby_spots(
    reference: Coordinate,
    radius_m: f64,
    spots: &[ParkingSpot],
) -> Vec<ParkingSpot> {
    let mut nearby: Vec<ParkingSpot> = spots
        .iter()
        .filter(|spot| spot.available)
        .filter_map(|spot| {
            let distance = geo::distance_m(reference, spot.coordinate);
            (distance <= radius_m).then(|| ParkingSpot {
                distance_from_reference_m: distance,
                ..spot.clone()
            })
        })
        .collect();

    nearby.sort_by(|a, b| {
        a.distance_from_reference_m
            .total_cmp(&b.distance_from_reference_m)
    });
    nearby
}

#[derive(Clone)]
pub struct ProximityNotifier {
    provider: Arc<dyn SpotProvider>,
}

impl ProximityNotifier {
    pub fn new(provider: Arc<dyn SpotProvider>) -> Self {
        Self { provider }
    }

    pub async fn nearby_spots(
        &self,
        reference: Coordinate,
        radius_m: f64,
    ) -> Result<Vec<ParkingSpot>, SpotProviderError> {
        let bbox = BoundingBox::around(reference, radius_m);
        let candidates = self.provider.query_available_spots(bbox).await?;
        let spots = find_nearby_spots(reference, radius_m, &candidates);
        tracing::debug!(
            "{} of {} candidate spot(s) within {:.0}m",
            spots.len(),
            candidates.len(),
            radius_m
        );
        Ok(spots)
    }
}

/// Spot catalogue held in memory, loaded from a JSON array of spots.
#[derive(Debug, Clone, Default)]
pub struct StaticSpotProvider {
    spots: Vec<ParkingSpot>,
}

impl StaticSpotProvider {
    pub fn new(spots: Vec<ParkingSpot>) -> Self {
        Self { spots }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SpotProviderError> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader(reader: impl Read) -> Result<Self, SpotProviderError> {
        let spots: Vec<ParkingSpot> = serde_json::from_reader(reader)?;
        Ok(Self::new(spots))
    }

    pub fn len(&self) -> usize {
        self.spots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spots.is_empty()
    }
}

impl SpotProvider for StaticSpotProvider {
    fn query_available_spots(
        &self,
        bbox: BoundingBox,
    ) -> BoxFuture<'_, Result<Vec<ParkingSpot>, SpotProviderError>> {
        let spots = self
            .spots
            .iter()
            .filter(|spot| spot.available && bbox.contains(spot.coordinate))
            .cloned()
            .collect();
        Box::pin(async move { Ok(spots) })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::geo::offset;

    const CENTER: Coordinate = Coordinate { lat: 45.0, lon: 5.0 };

    fn spot(id: &str, north_m: f64, east_m: f64, available: bool) -> ParkingSpot {
        ParkingSpot {
            id: id.into(),
            coordinate: offset(CENTER, north_m, east_m),
            name: format!("Spot {id}"),
            available,
            distance_from_reference_m: 0.0,
        }
    }

    #[test]
    fn filters_by_radius_and_availability_and_sorts() {
        let spots = vec![
            spot("far", 900.0, 0.0, true),
            spot("mid", 0.0, 300.0, true),
            spot("taken", 10.0, 0.0, false),
            spot("near", -50.0, 0.0, true),
        ];

        let nearby = find_nearby_spots(CENTER, 500.0, &spots);
        let ids: Vec<_> = nearby.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["near", "mid"]);
        assert!((nearby[0].distance_from_reference_m - 50.0).abs() < 0.1);
        assert!((nearby[1].distance_from_reference_m - 300.0).abs() < 0.5);
    }

    #[test]
    fn empty_input_gives_empty_output() {
        assert!(find_nearby_spots(CENTER, 1_000.0, &[]).is_empty());
    }

    #[tokio::test]
    async fn notifier_queries_provider_then_ranks() {
        let provider = StaticSpotProvider::new(vec![
            spot("a", 400.0, 0.0, true),
            spot("b", 100.0, 100.0, true),
            spot("outside-box", 5_000.0, 0.0, true),
        ]);
        let notifier = ProximityNotifier::new(Arc::new(provider));

        let spots = notifier.nearby_spots(CENTER, 450.0).await.unwrap();
        let ids: Vec<_> = spots.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["b", "a"]);
    }

    #[test]
    fn static_provider_loads_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let json = serde_json::to_string(&vec![spot("x", 0.0, 0.0, true)]).unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let provider = StaticSpotProvider::from_file(file.path()).unwrap();
        assert_eq!(provider.len(), 1);
    }

    #[test]
    fn static_provider_rejects_malformed_json() {
        let err = StaticSpotProvider::from_reader("{not json".as_bytes()).unwrap_err();
        assert!(matches!(err, SpotProviderError::Parse(_)));
    }
}
