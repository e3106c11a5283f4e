use std::collections::HashMap;

use rstar::{AABB, RTree, RTreeObject};
use thiserror::Error;
use tracing::trace;

use crate::entity::{Entity, EntityKind, Line};
use crate::geometry::{EntityId, Extent, Geometry};
use crate::nomenclature::LayerKind;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayerError {
    #[error("entity with id {0} not found")]
    EntityNotFound(EntityId),
}

/// R 树中的条目：插入时的包络与实体标识。
#[derive(Debug, Clone, Copy, PartialEq)]
struct IndexedEnvelope {
    id: EntityId,
    envelope: AABB<[f64; 2]>,
}

impl IndexedEnvelope {
    fn of(id: EntityId, geometry: &Geometry) -> Option<Self> {
        geometry
            .envelope()
            .to_aabb()
            .map(|envelope| Self { id, envelope })
    }
}

impl RTreeObject for IndexedEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// 按类别统计的实体数量。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntityCounts {
    pub points: usize,
    pub lines: usize,
    pub contours: usize,
    pub symbols: usize,
    pub texts: usize,
}

impl EntityCounts {
    pub fn total(&self) -> usize {
        self.points + self.lines + self.contours + self.symbols + self.texts
    }
}

/// 图层：有序实体列表，以及按几何包络建立的空间索引。
///
/// 没有几何的实体只进入列表，不进入索引。
#[derive(Debug, Clone)]
pub struct Layer {
    kind: LayerKind,
    entities: Vec<Entity>,
    positions: HashMap<EntityId, usize>,
    index: RTree<IndexedEnvelope>,
}

impl Layer {
    pub fn new(kind: LayerKind) -> Self {
        Self {
            kind,
            entities: Vec::new(),
            positions: HashMap::new(),
            index: RTree::new(),
        }
    }

    #[inline]
    pub fn kind(&self) -> LayerKind {
        self.kind
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    #[inline]
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.positions
            .get(&id)
            .and_then(|&position| self.entities.get(position))
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.positions.contains_key(&id)
    }

    /// 追加实体；有几何时同时写入索引。
    pub fn add_entity(&mut self, entity: impl Into<Entity>) -> EntityId {
        let entity = entity.into();
        let id = entity.id();
        if let Some(entry) = entity
            .geometry()
            .and_then(|geometry| IndexedEnvelope::of(id, geometry))
        {
            self.index.insert(entry);
        }
        self.positions.insert(id, self.entities.len());
        self.entities.push(entity);
        id
    }

    /// 移除实体。实体不存在时什么也不做。
    pub fn remove_entity(&mut self, id: EntityId) -> Option<Entity> {
        let position = self.positions.remove(&id)?;
        let entity = self.entities.remove(position);
        self.unindex(&entity);
        for (offset, shifted) in self.entities[position..].iter().enumerate() {
            self.positions.insert(shifted.id(), position + offset);
        }
        Some(entity)
    }

    fn unindex(&mut self, entity: &Entity) {
        if let Some(entry) = entity
            .geometry()
            .and_then(|geometry| IndexedEnvelope::of(entity.id(), geometry))
        {
            if self.index.remove(&entry).is_none() {
                trace!(id = %entity.id(), "entity envelope was not indexed");
            }
        }
    }

    /// 替换已入层实体的几何，先从索引移除旧包络再插入新包络。
    pub fn replace_geometry(
        &mut self,
        id: EntityId,
        geometry: impl Into<Geometry>,
    ) -> Result<(), LayerError> {
        let position = *self
            .positions
            .get(&id)
            .ok_or(LayerError::EntityNotFound(id))?;
        let mut entity = self.entities[position].clone();
        self.unindex(&entity);
        entity.set_geometry(geometry);
        if let Some(entry) = entity
            .geometry()
            .and_then(|geometry| IndexedEnvelope::of(id, geometry))
        {
            self.index.insert(entry);
        }
        self.entities[position] = entity;
        Ok(())
    }

    /// 按插入顺序返回满足条件的实体。
    pub fn search<F>(&self, predicate: F) -> Vec<&Entity>
    where
        F: Fn(&Entity) -> bool,
    {
        self.entities.iter().filter(|entity| predicate(entity)).collect()
    }

    /// 返回几何包络与给定范围相交的实体，顺序为索引的返回顺序。
    pub fn search_extent(&self, extent: &Extent) -> Vec<&Entity> {
        let Some(query) = extent.to_aabb() else {
            return Vec::new();
        };
        self.index
            .locate_in_envelope_intersecting(&query)
            .filter_map(|entry| self.entity(entry.id))
            .collect()
    }

    /// 按公开线号查找线。
    pub fn find_line(&self, number: i32) -> Option<&Line> {
        self.entities
            .iter()
            .filter_map(Entity::as_line)
            .find(|line| line.number == number)
    }

    pub fn counts(&self) -> EntityCounts {
        let mut counts = EntityCounts::default();
        for entity in &self.entities {
            match entity.kind() {
                EntityKind::Point => counts.points += 1,
                EntityKind::Line => counts.lines += 1,
                EntityKind::Contour => counts.contours += 1,
                EntityKind::Symbol => counts.symbols += 1,
                EntityKind::Text => counts.texts += 1,
            }
        }
        counts
    }

    /// 所有几何包络的并集。
    pub fn extent(&self) -> Extent {
        self.entities
            .iter()
            .filter_map(Entity::geometry)
            .fold(Extent::empty(), |acc, geometry| {
                acc.union(&geometry.envelope())
            })
    }

    /// 索引中的条目数，用于校验列表与索引的一致性。
    pub fn indexed_len(&self) -> usize {
        self.index.size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::GeoPoint;
    use crate::geometry::{Point, Polyline};

    const FIXTURE: [(i32, f64, f64); 5] = [
        (2158, 632.640, 1537.090),
        (2159, 634.870, 1559.220),
        (2160, 626.270, 1549.520),
        (2161, 626.940, 1553.410),
        (2162, 621.210, 1554.070),
    ];

    fn geo_point(number: i32, n: f64, e: f64) -> GeoPoint {
        let record = format!(
            "28 {number} {n:.3} {e:.3} 0.000 0 0.00 0.00 0 0.00 0 0 0 0 \"\" 25.11.2008 0"
        );
        let values: Vec<&str> = record.split_whitespace().collect();
        GeoPoint::from_fields(&values).expect("fixture point")
    }

    fn fixture_layer() -> Layer {
        let mut layer = Layer::new(LayerKind::Cadaster);
        for (number, n, e) in FIXTURE {
            layer.add_entity(geo_point(number, n, e));
        }
        layer
    }

    fn numbers(found: &[&Entity]) -> Vec<i32> {
        let mut numbers: Vec<i32> = found
            .iter()
            .filter_map(|entity| entity.as_point())
            .map(|point| point.number)
            .collect();
        numbers.sort_unstable();
        numbers
    }

    #[test]
    fn extent_search_matches_fixture_counts() {
        let layer = fixture_layer();
        assert_eq!(layer.indexed_len(), 5);

        let single = layer.search_extent(&Extent::new(631.362, 1553.444, 638.741, 1561.818));
        assert_eq!(numbers(&single), vec![2159]);

        let three = layer.search_extent(&Extent::new(619.358, 1544.629, 628.829, 1558.072));
        assert_eq!(numbers(&three), vec![2160, 2161, 2162]);

        let all = layer.search_extent(&Extent::new(616.936, 1534.712, 640.833, 1563.691));
        assert_eq!(all.len(), 5);

        let none = layer.search_extent(&Extent::new(633.344, 1541.874, 638.741, 1547.714));
        assert!(none.is_empty());
    }

    #[test]
    fn predicate_search_preserves_insertion_order() {
        let layer = fixture_layer();
        let found = layer.search(|entity| {
            entity
                .as_point()
                .is_some_and(|point| point.number % 2 == 0)
        });
        let order: Vec<i32> = found
            .iter()
            .filter_map(|entity| entity.as_point())
            .map(|point| point.number)
            .collect();
        assert_eq!(order, vec![2158, 2160, 2162]);
    }

    #[test]
    fn remove_is_exact_and_ignores_absent_entities() {
        let mut layer = fixture_layer();
        let target = layer.entities()[1].id();

        let removed = layer.remove_entity(target).expect("present entity");
        assert_eq!(removed.id(), target);
        assert_eq!(layer.len(), 4);
        assert_eq!(layer.indexed_len(), 4);
        assert!(layer.entity(target).is_none());

        assert!(layer.remove_entity(target).is_none());
        assert!(layer.remove_entity(EntityId::new()).is_none());
        assert_eq!(layer.len(), 4);

        let last = layer.entities()[3].id();
        assert_eq!(layer.entity(last).map(Entity::id), Some(last));
        let hit = layer.search_extent(&Extent::new(631.362, 1553.444, 638.741, 1561.818));
        assert!(hit.is_empty());
    }

    #[test]
    fn geometry_less_entities_are_listed_but_not_indexed() {
        let mut layer = Layer::new(LayerKind::Leso);
        let values = ["1", "10", "2", "01.01.2000", "0"];
        let line = Line::from_fields(&values).unwrap();
        let id = layer.add_entity(line);
        assert_eq!(layer.len(), 1);
        assert_eq!(layer.indexed_len(), 0);
        assert!(layer.find_line(10).is_some());

        let polyline = Polyline::new(vec![Point::planar(0.0, 0.0), Point::planar(10.0, 10.0)]);
        layer.replace_geometry(id, polyline).expect("entity exists");
        assert_eq!(layer.indexed_len(), 1);
        assert_eq!(
            layer.search_extent(&Extent::new(5.0, 5.0, 6.0, 6.0)).len(),
            1
        );
        let missing = EntityId::new();
        assert_eq!(
            layer.replace_geometry(missing, Point::planar(0.0, 0.0)),
            Err(LayerError::EntityNotFound(missing))
        );
        assert_eq!(layer.counts().lines, 1);
    }
}
