use crate::threads::repository::CommentRepository;

/// Where a new comment goes in its thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub parent_id: Option<String>,
    pub depth: i64,
}

impl Placement {
    pub fn root() -> Self {
        Self {
            parent_id: None,
            depth: 0,
        }
    }
}

/// Resolve the parent of a new comment on `post_id`.
///
/// Any failure to find the parent (unknown id, parent on another post,
/// storage error) places the comment at the root instead of failing the
/// whole creation. A reply that would sit deeper than `max_depth` is
/// attached next to its parent instead, so no thread nests past the cap.
pub async fn resolve_placement<R>(
    repo: &R,
    post_id: &str,
    parent_id: Option<&str>,
    max_depth: i64,
) -> Placement
where
    R: CommentRepository + ?Sized,
{
    let Some(parent_id) = parent_id.map(str::trim).filter(|p| !p.is_empty()) else {
        return Placement::root();
    };

    match repo.find_comment(parent_id).await {
        Ok(Some(parent)) if parent.post_id == post_id => {
            if parent.depth < max_depth.max(0) {
                Placement {
                    parent_id: Some(parent.id),
                    depth: parent.depth + 1,
                }
            } else {
                tracing::debug!(
                    parent = %parent_id,
                    max_depth,
                    "Reply at depth cap, attaching beside its parent"
                );
                match parent.parent_id {
                    Some(grandparent) => Placement {
                        parent_id: Some(grandparent),
                        depth: parent.depth,
                    },
                    None => Placement::root(),
                }
            }
        }
        Ok(Some(parent)) => {
            tracing::warn!(
                parent = %parent_id,
                parent_post = %parent.post_id,
                post = %post_id,
                "Parent belongs to another post, placing comment at root"
            );
            Placement::root()
        }
        Ok(None) => {
            tracing::warn!(parent = %parent_id, "Parent comment not found, placing comment at root");
            Placement::root()
        }
        Err(e) => {
            tracing::warn!(parent = %parent_id, "Parent lookup failed ({}), placing comment at root", e);
            Placement::root()
        }
    }
}
