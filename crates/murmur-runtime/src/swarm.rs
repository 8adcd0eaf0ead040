//! Named groups of agents addressed as a unit.

use murmur_core::agent::AgentId;

/// A named group of agents.
///
/// Swarms own no lifecycle of their own: members are ordinary registered
/// agents, and submitting to a swarm fans one task out per member.
#[derive(Debug, Clone)]
pub struct Swarm {
    name: String,
    members: Vec<AgentId>,
}

impl Swarm {
    pub(crate) fn new(name: impl Into<String>, members: Vec<AgentId>) -> Self {
        Self {
            name: name.into(),
            members,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn members(&self) -> &[AgentId] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Drop a member, used when its agent is unregistered.
    pub(crate) fn remove_member(&mut self, id: &AgentId) {
        self.members.retain(|m| m != id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remove_member_shrinks_swarm() {
        let a = AgentId::new("a").unwrap();
        let b = AgentId::new("b").unwrap();
        let mut swarm = Swarm::new("pair", vec![a.clone(), b.clone()]);
        assert_eq!(swarm.len(), 2);

        swarm.remove_member(&a);
        assert_eq!(swarm.members(), &[b]);
    }
}
