//! Bindings for the billing contracts.

use alloy_sol_types::sol;

sol!(
    #[allow(missing_docs)]
    #[derive(Debug)]
    #[sol(rpc)]
    interface IManagerFactory {
        event ManagerDeployed(address owner, address manager);

        function deployManager(bytes32 salt, address owner, address priceFeed) external returns (address);
        function getManagersByOwner(address owner) external view returns (address[] memory managers);
    }
);

sol!(
    #[allow(missing_docs)]
    #[allow(clippy::too_many_arguments)]
    #[derive(Debug)]
    #[sol(rpc)]
    interface ISubscriptionManager {
        struct Plan {
            uint256 planId;
            string name;
            uint256 feeUSD;
            bool exists;
            bool isLive;
        }

        event SubscriptionFeePaid(address indexed subscriber, uint256 planId, uint256 amount, uint256 timestamp);
        event PaymentFailed(address indexed subscriber, uint256 planId, uint256 subscriptionFeeWei, uint256 timestamp);

        function name() external view returns (string memory);
        function owner() external view returns (address);
        function paymaster() external view returns (address);
        function planCount() external view returns (uint256);
        function plans(uint256 index) external view returns (uint256 planId, string memory name, uint256 feeUSD, bool exists, bool isLive);
        function getLivePlans() external view returns (Plan[] memory);
        function getSubscriberCount(uint256 planId) external view returns (uint256);
        function subscriptions(address account) external view returns (uint256 planId, uint256 nextPaymentTimestamp, bool isActive);
        function convertUSDtoETH(uint256 usdAmount) external view returns (uint256);
        function convertETHtoUSD(uint256 ethAmount) external view returns (uint256);

        function createPlan(string memory name, uint256 feeUSD) external;
        function updatePlan(uint256 planId, string memory name, uint256 feeUSD) external;
        function deletePlan(uint256 planId) external;
        function makePlanLive(uint256 planId) external;
        function setPaymaster(address paymaster) external;
        function withdraw(uint256 amount) external;

        function subscribe(uint256 planId) external;
        function unsubscribe() external;
    }
);

sol!(
    #[allow(missing_docs)]
    #[derive(Debug)]
    #[sol(rpc)]
    interface ISubscriptionPaymaster {
        function withdraw(address to) external;
    }
);

sol!(
    #[allow(missing_docs)]
    #[derive(Debug)]
    #[sol(rpc)]
    interface IAAFactory {
        function deployAccount(bytes32 salt, address owner, address subscriptionManager, address priceFeed) external returns (address);
        function getAccountByOwnerAndManager(address owner, address manager) external view returns (address);
    }
);

sol!(
    #[allow(missing_docs)]
    #[derive(Debug)]
    #[sol(rpc)]
    interface ISubscriptionAccount {
        function withdraw(uint256 amount) external;
        function setSpendingLimit(address token, uint256 amount) external;
        function removeSpendingLimit(address token) external;
        function limits(address token) external view returns (uint256 limit, uint256 available, uint256 resetTime, bool isEnabled);
    }
);

sol!(
    /// Paymaster flow selectors understood by zkSync paymasters.
    #[allow(missing_docs)]
    interface IPaymasterFlow {
        function general(bytes calldata input) external;
    }
);
