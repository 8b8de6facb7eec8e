//! Two-node convergence over real UDP sockets.

use std::time::Duration;

use atoll_node::{AtollNode, NodeConfig};
use atoll_workspace::ContentAddress;

fn config(workspace: &str, announce_every: Duration) -> NodeConfig {
    NodeConfig {
        workspace: workspace.to_string(),
        bind: "127.0.0.1:0".parse().unwrap(),
        peers: Vec::new(),
        announce_every,
        peer_refresh_every: Duration::from_secs(1),
    }
}

/// Poll a node's address list until it contains `address` or time runs out.
async fn wait_for_address(node: &AtollNode, address: &ContentAddress) {
    for _ in 0..40 {
        let listed = node.handle().addresses().await.unwrap();
        if listed.contains(address) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("address {address} never arrived");
}

#[tokio::test]
async fn file_added_on_one_node_reaches_the_other() {
    let node1 = AtollNode::new(config("demo", Duration::from_secs(30)))
        .await
        .unwrap();
    let node2 = AtollNode::new(config("demo", Duration::from_secs(30)))
        .await
        .unwrap();

    node1.start().await.unwrap();
    node2.start().await.unwrap();

    node2
        .connect_peer(&node1.local_addr().unwrap().to_string())
        .await
        .unwrap();
    // Let the subscription exchange settle.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let address = node1
        .add_file("shared.txt", b"shared bytes".to_vec())
        .await
        .unwrap();

    wait_for_address(&node2, &address).await;

    // The content only exists in node1's store; node2 records the address
    // anyway and reports the failed fetch without retrying.
    assert_eq!(node2.handle().addresses().await.unwrap(), vec![address]);
}

#[tokio::test]
async fn late_joiner_recovers_via_announcement() {
    // Aggressive announce interval so the test does not wait 10 seconds.
    let node1 = AtollNode::new(config("demo", Duration::from_millis(200)))
        .await
        .unwrap();
    node1.start().await.unwrap();

    let address = node1.add_file("early.txt", b"early".to_vec()).await.unwrap();

    // Joins after the add; the only recovery path is the announcer.
    let node2 = AtollNode::new(config("demo", Duration::from_secs(30)))
        .await
        .unwrap();
    node2.start().await.unwrap();
    node2
        .connect_peer(&node1.local_addr().unwrap().to_string())
        .await
        .unwrap();

    wait_for_address(&node2, &address).await;
}

#[tokio::test]
async fn different_workspaces_stay_isolated() {
    let node1 = AtollNode::new(config("reef", Duration::from_millis(200)))
        .await
        .unwrap();
    let node2 = AtollNode::new(config("lagoon", Duration::from_millis(200)))
        .await
        .unwrap();

    node1.start().await.unwrap();
    node2.start().await.unwrap();
    node2
        .connect_peer(&node1.local_addr().unwrap().to_string())
        .await
        .unwrap();

    node1.add_file("reef.txt", b"reef only".to_vec()).await.unwrap();

    // Several announce intervals pass; nothing may cross workspaces.
    tokio::time::sleep(Duration::from_millis(800)).await;
    assert!(node2.handle().addresses().await.unwrap().is_empty());
}
