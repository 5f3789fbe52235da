//! 엔티티 그래프 상관 분석
//!
//! 이벤트와 엔티티(감시 키/값 쌍)를 노드로 하는 무방향 이분 그래프를 만들고,
//! BFS로 연결 요소를 찾아 같은 요소에 속한 이벤트끼리 연결합니다.
//!
//! ```text
//! A --ip:1.2.3.4-- B --userId:alice-- C      =>  A, B, C 모두 Cluster:0
//! D                                          =>  Cluster:1 (단독)
//! ```
//!
//! 시간 복잡도는 O(V+E)입니다.

use std::collections::{HashMap, VecDeque};

use incident_timeline_core::pipeline::Correlator;
use incident_timeline_core::types::{
    CLUSTER_TAG_PREFIX, CRITICAL_TAG, Entity, Event, TimelineEvent, WatchedKey,
};

/// 이벤트-엔티티 이분 그래프
///
/// 노드 `0..events.len()`은 이벤트, 그 이후는 엔티티입니다.
#[derive(Debug)]
pub struct EntityGraph<'a> {
    events: &'a [Event],
    entities: Vec<Entity>,
    adjacency: Vec<Vec<usize>>,
}

/// 연결 요소
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    /// 요소 번호 (BFS 시작 순서)
    pub index: usize,
    /// 구성 이벤트 인덱스 (오름차순)
    pub members: Vec<usize>,
    /// 경유한 엔티티 (정렬됨)
    pub entities: Vec<Entity>,
}

impl<'a> EntityGraph<'a> {
    /// 이벤트 목록으로 그래프를 구성합니다.
    pub fn build(events: &'a [Event]) -> Self {
        let n = events.len();
        let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut entities: Vec<Entity> = Vec::new();
        let mut entity_nodes: HashMap<(WatchedKey, &'a str), usize> = HashMap::new();

        for (event_node, event) in events.iter().enumerate() {
            for (key, value) in event.metadata.watched() {
                let entity_node = *entity_nodes.entry((key, value)).or_insert_with(|| {
                    entities.push(Entity::new(key, value));
                    adjacency.push(Vec::new());
                    n + entities.len() - 1
                });
                adjacency[event_node].push(entity_node);
                adjacency[entity_node].push(event_node);
            }
        }

        Self {
            events,
            entities,
            adjacency,
        }
    }

    /// 이벤트 노드 수
    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// 엔티티 노드 수
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// 간선 수
    pub fn edge_count(&self) -> usize {
        self.adjacency[..self.events.len()]
            .iter()
            .map(Vec::len)
            .sum()
    }

    /// 연결 요소를 계산합니다.
    ///
    /// 입력 순서대로 방문하지 않은 이벤트 노드에서 BFS를 시작하므로,
    /// 같은 입력 순서에 대해 요소 번호는 결정적입니다.
    pub fn components(&self) -> Vec<Component> {
        let n = self.events.len();
        let mut visited = vec![false; self.adjacency.len()];
        let mut queue = VecDeque::new();
        let mut components = Vec::new();

        for start in 0..n {
            if visited[start] {
                continue;
            }
            visited[start] = true;
            queue.push_back(start);

            let mut members = Vec::new();
            let mut entities = Vec::new();

            while let Some(node) = queue.pop_front() {
                if node < n {
                    members.push(node);
                } else {
                    entities.push(self.entities[node - n].clone());
                }
                for &next in &self.adjacency[node] {
                    if !visited[next] {
                        visited[next] = true;
                        queue.push_back(next);
                    }
                }
            }

            members.sort_unstable();
            entities.sort();
            components.push(Component {
                index: components.len(),
                members,
                entities,
            });
        }

        components
    }
}

/// 엔티티 그래프 기반 상관 분석기
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphCorrelator;

impl GraphCorrelator {
    /// 새 상관 분석기를 생성합니다.
    pub fn new() -> Self {
        Self
    }
}

impl Correlator for GraphCorrelator {
    fn name(&self) -> &str {
        "entity-graph"
    }

    fn correlate(&self, events: &[Event]) -> Vec<TimelineEvent> {
        let graph = EntityGraph::build(events);
        let mut slots: Vec<Option<TimelineEvent>> = vec![None; events.len()];

        for component in graph.components() {
            let cluster_tag = format!("{CLUSTER_TAG_PREFIX}{}", component.index);
            for &member in &component.members {
                let event = &events[member];
                let related_events = component
                    .members
                    .iter()
                    .filter(|&&other| other != member)
                    .map(|&other| events[other].id.clone())
                    .collect();

                let mut tags = vec![cluster_tag.clone()];
                if event.level.is_critical() {
                    tags.push(CRITICAL_TAG.to_owned());
                }

                slots[member] = Some(TimelineEvent {
                    event: event.clone(),
                    related_events,
                    tags,
                });
            }
        }

        let mut timeline: Vec<TimelineEvent> = slots.into_iter().flatten().collect();
        // 안정 정렬: 같은 타임스탬프는 입력 순서 유지
        timeline.sort_by_key(|te| te.event.timestamp);
        timeline
    }
}
