use crate::{
    auth::{Identity, can_edit, ensure_can_edit, include_geometry},
    error::ApiError,
    geometry::parse_line_string,
    models::{
        GeometryResponse, NewRoute, Route, RouteCreateRequest, RoutePage, RouteResponse,
        RouteUpdateRequest,
    },
    repository::RepositoryState,
};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// RouteService
///
/// Route reads and writes on behalf of an explicit caller. Every response goes through
/// [`view_for`], so the ownership flag and the geometry visibility rule are applied in one
/// place; every mutation passes [`ensure_can_edit`] before the repository is touched.
#[derive(Clone)]
pub struct RouteService {
    repo: RepositoryState,
}

impl RouteService {
    pub fn new(repo: RepositoryState) -> Self {
        Self { repo }
    }

    /// create
    ///
    /// Stores a new route owned by the caller. The owner sees the full route back.
    pub async fn create(
        &self,
        owner: &Identity,
        req: RouteCreateRequest,
    ) -> Result<RouteResponse, ApiError> {
        let name = req.name.trim();
        if name.is_empty() {
            return Err(ApiError::BadRequest("name is required".to_string()));
        }
        if req.distance_meters <= 0 {
            return Err(ApiError::BadRequest(
                "distanceMeters must be > 0".to_string(),
            ));
        }
        if req.geom_wkt.trim().is_empty() {
            return Err(ApiError::BadRequest("geomWkt is required".to_string()));
        }
        let line = parse_line_string(&req.geom_wkt)?;

        let route = self
            .repo
            .create_route(NewRoute {
                owner_username: owner.subject.clone(),
                name: name.to_string(),
                distance_meters: Some(req.distance_meters),
                is_public: req.is_public,
                geom_wkt: Some(line.to_wkt()),
            })
            .await?;

        tracing::info!(route_id = route.id, owner = %route.owner_username, "route created");
        Ok(to_response(route, true, true))
    }

    /// list_public
    ///
    /// One page of public routes, newest first. Listings are summaries: geometry is never
    /// included, only the details view carries it.
    pub async fn list_public(
        &self,
        viewer: Option<&Identity>,
        page: u32,
        size: u32,
    ) -> Result<RoutePage, ApiError> {
        let size = i64::from(size.clamp(1, MAX_PAGE_SIZE));
        let page = i64::from(page);
        let (routes, total_elements) = self
            .repo
            .find_public_routes(size, page.saturating_mul(size))
            .await?;

        let content = routes
            .into_iter()
            .map(|route| {
                let editable = can_edit(&route.owner_username, viewer.map(|v| v.subject.as_str()));
                to_response(route, false, editable)
            })
            .collect();

        Ok(RoutePage {
            content,
            total_elements,
            total_pages: (total_elements + size - 1) / size,
            number: page,
            size,
        })
    }

    /// The caller's own routes, public or not. Summaries, like the public listing.
    pub async fn mine(&self, owner: &Identity) -> Result<Vec<RouteResponse>, ApiError> {
        let routes = self.repo.find_routes_by_owner(&owner.subject).await?;
        Ok(routes
            .into_iter()
            .map(|route| to_response(route, false, true))
            .collect())
    }

    /// Route details as seen by `viewer` (anonymous when `None`).
    pub async fn get_for_viewer(
        &self,
        id: i64,
        viewer: Option<&Identity>,
    ) -> Result<RouteResponse, ApiError> {
        let route = self.find(id).await?;
        Ok(view_for(route, viewer))
    }

    /// update
    ///
    /// Partial update. Ownership is checked first, then every provided field is validated;
    /// only after both succeed is the route written, in a single save. A blank `geomWkt`
    /// clears the geometry.
    pub async fn update(
        &self,
        id: i64,
        req: RouteUpdateRequest,
        caller: &Identity,
    ) -> Result<RouteResponse, ApiError> {
        let mut route = self.find(id).await?;
        ensure_can_edit(&route.owner_username, caller)?;

        if let Some(name) = req.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(ApiError::BadRequest("name must not be blank".to_string()));
            }
            route.name = name.to_string();
        }
        if let Some(distance) = req.distance_meters {
            if distance <= 0 {
                return Err(ApiError::BadRequest(
                    "distanceMeters must be > 0".to_string(),
                ));
            }
            route.distance_meters = Some(distance);
        }
        if let Some(is_public) = req.is_public {
            route.is_public = is_public;
        }
        if let Some(wkt) = req.geom_wkt {
            route.geom_wkt = if wkt.trim().is_empty() {
                None
            } else {
                Some(parse_line_string(&wkt)?.to_wkt())
            };
        }

        let saved = self
            .repo
            .save_route(&route)
            .await?
            .ok_or_else(|| ApiError::route_not_found(id))?;

        tracing::info!(route_id = id, caller = %caller.subject, "route updated");
        Ok(to_response(saved, true, true))
    }

    pub async fn delete(&self, id: i64, caller: &Identity) -> Result<(), ApiError> {
        let route = self.find(id).await?;
        ensure_can_edit(&route.owner_username, caller)?;

        if !self.repo.delete_route(id).await? {
            return Err(ApiError::route_not_found(id));
        }
        tracing::info!(route_id = id, caller = %caller.subject, "route deleted");
        Ok(())
    }

    /// geometry_for_viewer
    ///
    /// The bare geometry of a route. Subject to the same visibility rule as the details
    /// view: a private route's line is only returned to its owner.
    pub async fn geometry_for_viewer(
        &self,
        id: i64,
        viewer: Option<&Identity>,
    ) -> Result<GeometryResponse, ApiError> {
        let route = self.find(id).await?;
        let editable = can_edit(&route.owner_username, viewer.map(|v| v.subject.as_str()));
        if !include_geometry(route.is_public, editable) {
            return Err(ApiError::Forbidden(
                "Route geometry is not visible".to_string(),
            ));
        }

        match route.geom_wkt {
            Some(wkt) => Ok(GeometryResponse { id: route.id, wkt }),
            None => Err(ApiError::NotFound(format!("Route has no geometry: {}", id))),
        }
    }

    async fn find(&self, id: i64) -> Result<Route, ApiError> {
        self.repo
            .find_route(id)
            .await?
            .ok_or_else(|| ApiError::route_not_found(id))
    }
}

/// Applies the ownership and visibility rules for one viewer.
pub fn view_for(route: Route, viewer: Option<&Identity>) -> RouteResponse {
    let editable = can_edit(&route.owner_username, viewer.map(|v| v.subject.as_str()));
    let show_geometry = include_geometry(route.is_public, editable);
    to_response(route, show_geometry, editable)
}

fn to_response(route: Route, include_geom: bool, can_edit: bool) -> RouteResponse {
    RouteResponse {
        id: route.id,
        name: route.name,
        distance_meters: route.distance_meters,
        is_public: route.is_public,
        created_at: route.created_at,
        geom_wkt: if include_geom { route.geom_wkt } else { None },
        owner_username: route.owner_username,
        can_edit,
    }
}
