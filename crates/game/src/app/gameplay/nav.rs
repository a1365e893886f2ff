const NEIGHBOR_OFFSETS: [(i32, i32); 8] = [
    (0, 1),
    (1, 0),
    (0, -1),
    (-1, 0),
    (1, 1),
    (1, -1),
    (-1, -1),
    (-1, 1),
];

fn is_walkable_tile(tilemap: &Tilemap, position: GridPos) -> bool {
    tilemap
        .tile_at(position)
        .is_some_and(|tile| tile != TILE_WALL)
}

/// A cell is valid when it lies on the floor map and is not a wall.
/// A world without a floor map is treated as open ground.
fn is_valid_position(world: &SceneWorld, position: GridPos) -> bool {
    match world.tilemap() {
        Some(tilemap) => is_walkable_tile(tilemap, position),
        None => true,
    }
}

/// Cells within `radius` (Euclidean) of `origin` that have an unobstructed line to it.
/// Walls are visible but hide what lies behind them.
fn compute_field_of_view(tilemap: &Tilemap, origin: GridPos, radius: i32) -> HashSet<GridPos> {
    let mut visible = HashSet::new();
    if !tilemap.contains(origin) {
        return visible;
    }
    visible.insert(origin);
    let radius = radius.max(0);
    let radius_f = radius as f32;

    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let cell = origin.offset(dx, dy);
            if cell == origin || !tilemap.contains(cell) || origin.distance(cell) > radius_f {
                continue;
            }
            if has_line_of_sight(tilemap, origin, cell) {
                visible.insert(cell);
            }
        }
    }
    visible
}

fn has_line_of_sight(tilemap: &Tilemap, from: GridPos, to: GridPos) -> bool {
    bresenham_line(from, to)
        .into_iter()
        .skip(1)
        .take_while(|cell| *cell != to)
        .all(|cell| is_walkable_tile(tilemap, cell))
}

fn bresenham_line(from: GridPos, to: GridPos) -> Vec<GridPos> {
    let dx = (to.x - from.x).abs();
    let dy = -(to.y - from.y).abs();
    let step_x = if from.x < to.x { 1 } else { -1 };
    let step_y = if from.y < to.y { 1 } else { -1 };
    let mut error = dx + dy;
    let mut cursor = from;
    let mut cells = vec![cursor];

    while cursor != to {
        let doubled = 2 * error;
        if doubled >= dy {
            error += dy;
            cursor.x += step_x;
        }
        if doubled <= dx {
            error += dx;
            cursor.y += step_y;
        }
        cells.push(cursor);
    }
    cells
}

/// Deterministic 8-neighbour A* on the floor map. `blocked` cells are treated as
/// walls unless they are the goal. Returns the full path including `start`.
fn find_path(
    tilemap: &Tilemap,
    blocked: &HashSet<GridPos>,
    start: GridPos,
    goal: GridPos,
) -> Option<Vec<GridPos>> {
    let start_index = tilemap.index_of(start)?;
    let goal_index = tilemap.index_of(goal)?;
    if !is_walkable_tile(tilemap, goal) {
        return None;
    }
    if start == goal {
        return Some(vec![start]);
    }

    let node_count = tilemap.width() as usize * tilemap.height() as usize;
    let mut closed = vec![false; node_count];
    let mut best_g = vec![u32::MAX; node_count];
    let mut parent = vec![None::<usize>; node_count];
    let mut open = Vec::new();
    let mut next_insertion = 0u64;

    let start_h = start.chebyshev(goal) as u32;
    open.push(OpenNode {
        coord: start,
        h_cost: start_h,
        f_cost: start_h,
        insertion_order: next_insertion,
    });
    next_insertion += 1;
    best_g[start_index] = 0;

    while !open.is_empty() {
        let best_index = pick_best_open_node_index(&open);
        let current = open.swap_remove(best_index);
        let Some(current_index) = tilemap.index_of(current.coord) else {
            continue;
        };
        if closed[current_index] {
            continue;
        }
        closed[current_index] = true;

        if current.coord == goal {
            return reconstruct_path(&parent, tilemap.width(), start_index, goal_index);
        }

        let current_g = best_g[current_index];
        for (dx, dy) in NEIGHBOR_OFFSETS {
            let neighbor = current.coord.offset(dx, dy);
            let Some(neighbor_index) = tilemap.index_of(neighbor) else {
                continue;
            };
            if closed[neighbor_index] || !is_walkable_tile(tilemap, neighbor) {
                continue;
            }
            if neighbor != goal && blocked.contains(&neighbor) {
                continue;
            }

            let tentative_g = current_g.saturating_add(1);
            if tentative_g >= best_g[neighbor_index] {
                continue;
            }
            best_g[neighbor_index] = tentative_g;
            parent[neighbor_index] = Some(current_index);
            let h_cost = neighbor.chebyshev(goal) as u32;
            open.push(OpenNode {
                coord: neighbor,
                h_cost,
                f_cost: tentative_g.saturating_add(h_cost),
                insertion_order: next_insertion,
            });
            next_insertion += 1;
        }
    }

    None
}

#[derive(Debug, Clone, Copy)]
struct OpenNode {
    coord: GridPos,
    h_cost: u32,
    f_cost: u32,
    insertion_order: u64,
}

fn pick_best_open_node_index(open: &[OpenNode]) -> usize {
    let mut best_index = 0usize;
    for index in 1..open.len() {
        if open_node_order_key(open[index]) < open_node_order_key(open[best_index]) {
            best_index = index;
        }
    }
    best_index
}

fn open_node_order_key(node: OpenNode) -> (u32, u32, i32, i32, u64) {
    (
        node.f_cost,
        node.h_cost,
        node.coord.y,
        node.coord.x,
        node.insertion_order,
    )
}

fn reconstruct_path(
    parent: &[Option<usize>],
    width: u32,
    start_index: usize,
    goal_index: usize,
) -> Option<Vec<GridPos>> {
    let width = width as usize;
    let mut cursor = goal_index;
    let mut indices = vec![cursor];
    while cursor != start_index {
        cursor = parent.get(cursor).copied().flatten()?;
        indices.push(cursor);
    }
    indices.reverse();
    Some(
        indices
            .into_iter()
            .map(|index| GridPos::new((index % width) as i32, (index / width) as i32))
            .collect(),
    )
}

impl GameSession {
    /// Pathfinding collaborator: the first cell on a path from `from` toward `goal`,
    /// routing around walls and blocking actors.
    fn next_step_toward(&self, world: &SceneWorld, from: GridPos, goal: GridPos) -> Option<GridPos> {
        let Some(tilemap) = world.tilemap() else {
            let dx = (goal.x - from.x).signum();
            let dy = (goal.y - from.y).signum();
            return (dx != 0 || dy != 0).then(|| from.offset(dx, dy));
        };
        let blocked = self
            .actors
            .iter()
            .filter_map(|id| world.find_entity(*id))
            .filter(|entity| entity.blocks_movement)
            .map(|entity| entity.position)
            .collect::<HashSet<_>>();
        find_path(tilemap, &blocked, from, goal)?.get(1).copied()
    }
}

#[cfg(test)]
mod nav_tests {
    use super::*;

    fn open_room(width: u32, height: u32) -> Tilemap {
        let mut tilemap = Tilemap::filled(width, height, TILE_FLOOR);
        for x in 0..width as i32 {
            tilemap.set_tile(GridPos::new(x, 0), TILE_WALL);
            tilemap.set_tile(GridPos::new(x, height as i32 - 1), TILE_WALL);
        }
        for y in 0..height as i32 {
            tilemap.set_tile(GridPos::new(0, y), TILE_WALL);
            tilemap.set_tile(GridPos::new(width as i32 - 1, y), TILE_WALL);
        }
        tilemap
    }

    #[test]
    fn astar_path_routes_around_a_wall_segment() {
        let mut tilemap = open_room(9, 7);
        for y in 1..5 {
            tilemap.set_tile(GridPos::new(4, y), TILE_WALL);
        }
        let path = find_path(
            &tilemap,
            &HashSet::new(),
            GridPos::new(2, 2),
            GridPos::new(6, 2),
        )
        .expect("reachable");

        assert_eq!(path.first(), Some(&GridPos::new(2, 2)));
        assert_eq!(path.last(), Some(&GridPos::new(6, 2)));
        for cell in &path {
            assert!(is_walkable_tile(&tilemap, *cell), "path crossed {cell:?}");
        }
        for pair in path.windows(2) {
            assert_eq!(pair[0].chebyshev(pair[1]), 1);
        }
    }

    #[test]
    fn astar_uses_diagonal_steps() {
        let tilemap = open_room(8, 8);
        let path = find_path(
            &tilemap,
            &HashSet::new(),
            GridPos::new(1, 1),
            GridPos::new(4, 4),
        )
        .expect("reachable");
        assert_eq!(path.len(), 4);
    }

    #[test]
    fn astar_tie_break_is_deterministic() {
        let mut tilemap = open_room(7, 7);
        tilemap.set_tile(GridPos::new(3, 3), TILE_WALL);
        let start = GridPos::new(1, 3);
        let goal = GridPos::new(5, 3);
        let first = find_path(&tilemap, &HashSet::new(), start, goal);
        let second = find_path(&tilemap, &HashSet::new(), start, goal);
        assert!(first.is_some());
        assert_eq!(first, second);
    }

    #[test]
    fn blocked_cells_are_avoided_except_the_goal() {
        let tilemap = open_room(7, 5);
        let blocked = HashSet::from([GridPos::new(3, 2), GridPos::new(5, 2)]);
        let path = find_path(&tilemap, &blocked, GridPos::new(1, 2), GridPos::new(5, 2))
            .expect("reachable");
        assert!(!path.contains(&GridPos::new(3, 2)));
        assert_eq!(path.last(), Some(&GridPos::new(5, 2)));
    }

    #[test]
    fn unreachable_goal_yields_no_path() {
        let mut tilemap = open_room(7, 5);
        for y in 0..5 {
            tilemap.set_tile(GridPos::new(3, y), TILE_WALL);
        }
        assert_eq!(
            find_path(
                &tilemap,
                &HashSet::new(),
                GridPos::new(1, 2),
                GridPos::new(5, 2)
            ),
            None
        );
    }

    #[test]
    fn field_of_view_respects_radius_and_walls() {
        let mut tilemap = open_room(15, 15);
        tilemap.set_tile(GridPos::new(7, 9), TILE_WALL);
        let origin = GridPos::new(7, 7);
        let visible = compute_field_of_view(&tilemap, origin, 4);

        assert!(visible.contains(&origin));
        assert!(visible.contains(&GridPos::new(7, 8)));
        assert!(visible.contains(&GridPos::new(7, 9)), "walls themselves are seen");
        assert!(!visible.contains(&GridPos::new(7, 10)), "cells behind walls are hidden");
        assert!(visible.contains(&GridPos::new(11, 7)));
        assert!(!visible.contains(&GridPos::new(11, 11)), "corner lies outside radius");
    }

    #[test]
    fn bresenham_line_includes_both_endpoints() {
        let line = bresenham_line(GridPos::new(0, 0), GridPos::new(3, 1));
        assert_eq!(line.first(), Some(&GridPos::new(0, 0)));
        assert_eq!(line.last(), Some(&GridPos::new(3, 1)));
        assert_eq!(line.len(), 4);
    }
}
