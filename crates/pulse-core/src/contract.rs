//! `PulseChat` contract ABI.
//!
//! Field order of `Message` and the indexed topics of `MessageSent` follow the
//! deployed contract's ABI artifact.

use alloy_sol_types::sol;

sol! {
    /// Message as returned by `getLatestMessages`
    #[derive(Debug, PartialEq, Eq)]
    struct Message {
        address sender;
        string content;
        uint256 timestamp;
        uint256 messageId;
    }

    #[derive(Debug, PartialEq, Eq)]
    interface PulseChat {
        /// Emitted for every message appended to the public log
        event MessageSent(
            address indexed sender,
            string content,
            uint256 timestamp,
            uint256 indexed messageId
        );

        function registerUser(string username, string signature, string avatarUrl) external;

        function isUsernameAvailable(string username) external view returns (bool);

        function sendMessage(string content) external;

        function getLatestMessages(uint256 count) external view returns (Message[] memory);

        function getTotalMessages() external view returns (uint256);

        function getUserProfile(address user) external view returns (
            string username,
            string signature,
            string avatarUrl,
            uint256 registeredAt,
            bool isRegistered
        );

        function getAllUsers() external view returns (address[] memory);
    }
}
