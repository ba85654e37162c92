// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn agent_ref_joins_url_and_port() {
    let cfg = AgentConfig {
        name: "idsearcher".into(),
        url: "localhost".into(),
        port: 9001,
        kind: "codereader".into(),
        kv: HashMap::new(),
    };
    let ar = cfg.agent_ref();
    assert_eq!(ar.name, "idsearcher");
    assert_eq!(ar.address, "localhost:9001");
}
