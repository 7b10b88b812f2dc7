// Copyright 2025 OPPO.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeState {
    Unauthenticated,
    Connected,
    Enabled,
    Disabled,
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeEvent {
    Connect,
    EnableSucceeded,
    EnableFailed,
    KeepAlive,
    Disable,
    Close,
}

impl NodeState {
    pub fn is_live(&self) -> bool {
        matches!(
            self,
            NodeState::Connected | NodeState::Enabled | NodeState::Disabled
        )
    }

    pub fn apply(self, event: NodeEvent) -> Result<NodeState, String> {
        use NodeEvent::*;
        use NodeState::*;

        let next = match (self, event) {
            (Terminated, _) => return Err(format!("{:?} after the channel closed", event)),
            (_, Close) => Terminated,

            (Unauthenticated, Connect) => Connected,
            (Unauthenticated, _) => return Err(format!("{:?} before authentication", event)),
            (_, Connect) => return Err("already connected".to_string()),

            (_, EnableSucceeded) => Enabled,
            // A failed re-enable keeps the entry admitted before.
            (s, EnableFailed) => s,

            (s, KeepAlive) => s,

            (Enabled, Disable) => Disabled,
            (s, Disable) => s,
        };
        Ok(next)
    }
}

impl Display for NodeState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::NodeEvent::*;
    use super::NodeState::*;
    use super::*;

    fn run(events: &[NodeEvent]) -> Result<NodeState, String> {
        events.iter().try_fold(Unauthenticated, |s, e| s.apply(*e))
    }

    #[test]
    fn lifecycle() {
        assert_eq!(run(&[Connect]), Ok(Connected));
        assert_eq!(run(&[Connect, EnableFailed]), Ok(Connected));
        assert_eq!(run(&[Connect, EnableSucceeded, KeepAlive]), Ok(Enabled));
        assert_eq!(run(&[Connect, EnableSucceeded, Disable]), Ok(Disabled));
        assert_eq!(
            run(&[Connect, EnableSucceeded, Disable, EnableSucceeded]),
            Ok(Enabled)
        );
        assert_eq!(run(&[Connect, EnableSucceeded, EnableSucceeded]), Ok(Enabled));
        assert_eq!(run(&[Connect, EnableSucceeded, EnableFailed]), Ok(Enabled));
    }

    #[test]
    fn disable_is_idempotent() {
        assert_eq!(run(&[Connect, Disable, Disable]), Ok(Connected));
        assert_eq!(run(&[Connect, EnableSucceeded, Disable, Disable]), Ok(Disabled));
    }

    #[test]
    fn close_is_terminal() {
        for prefix in [&[][..], &[Connect][..], &[Connect, EnableSucceeded][..]] {
            let mut events = prefix.to_vec();
            events.push(Close);
            assert_eq!(run(&events), Ok(Terminated));

            events.push(KeepAlive);
            assert!(run(&events).is_err());
        }
    }

    #[test]
    fn events_need_authentication() {
        assert!(run(&[EnableSucceeded]).is_err());
        assert!(run(&[Connect, Connect]).is_err());
        assert!(!Unauthenticated.is_live());
        assert!(Disabled.is_live());
    }
}
